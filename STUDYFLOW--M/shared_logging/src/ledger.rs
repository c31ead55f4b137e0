use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context, Result};

/// Append-only CSV file with a fixed column layout.
///
/// The header row is written once, when the file is first created (or found empty).
/// Each [`CsvLedger::append`] opens the file, writes one row, flushes, and closes it
/// again, so no handle outlives a single call.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    columns: Vec<String>,
}

impl CsvLedger {
    /// Opens the ledger, creating it with a header row if it does not exist yet.
    pub fn open<I, S>(path: impl Into<PathBuf>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let path = path.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        ensure!(!columns.is_empty(), "ledger {} has no columns", path.display());
        let ledger = Self { path, columns };
        ledger.ensure_header()?;
        Ok(ledger)
    }

    fn ensure_header(&self) -> Result<()> {
        let empty = match fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                return Err(err).with_context(|| format!("inspecting {}", self.path.display()))
            }
        };
        if !empty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating ledger dir {}", parent.display()))?;
        }
        self.write_line(&encode_row(&self.columns))
    }

    /// Appends one row. The number of fields must match the header.
    pub fn append<S: AsRef<str>>(&self, fields: &[S]) -> Result<()> {
        ensure!(
            fields.len() == self.columns.len(),
            "ledger {} expects {} fields, got {}",
            self.path.display(),
            self.columns.len(),
            fields.len()
        );
        self.write_line(&encode_row(fields))
    }

    fn write_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening ledger {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .and_then(|()| file.write_all(b"\n"))
            .and_then(|()| file.flush())
            .with_context(|| format!("appending to ledger {}", self.path.display()))
    }

    /// Column names in file order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Location of the ledger on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|field| escape_field(field.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

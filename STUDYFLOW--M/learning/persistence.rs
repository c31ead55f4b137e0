use std::{
    collections::{BTreeMap, HashSet},
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{PersistenceError, StateLoadError},
    levels::{PerformanceLevel, SubjectStateStore},
    value_table::{Action, ValueKey, ValueTable},
};

/// One value-table cell as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ValueRecord {
    /// Subject identifier, stored verbatim.
    pub subject: String,
    /// Level code (0, 1, 2).
    pub level: PerformanceLevel,
    /// Action label.
    pub action: Action,
    /// Learned estimate.
    pub value: f64,
}

/// On-disk learner state: a flat list of value cells plus explicit subject levels.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StateFile {
    /// Every stored value-table cell.
    pub value_table: Vec<ValueRecord>,
    /// Subject → level code.
    pub subject_levels: BTreeMap<String, PerformanceLevel>,
}

impl StateFile {
    /// Captures the current in-memory state.
    #[must_use]
    pub fn capture(table: &ValueTable, levels: &SubjectStateStore) -> Self {
        Self {
            value_table: table
                .entries()
                .into_iter()
                .map(|(key, value)| ValueRecord {
                    subject: key.subject,
                    level: key.level,
                    action: key.action,
                    value,
                })
                .collect(),
            subject_levels: levels
                .iter()
                .map(|(subject, level)| (subject.to_owned(), level))
                .collect(),
        }
    }

    /// Rebuilds the in-memory structures, rejecting duplicate or non-finite cells.
    pub fn restore(self) -> Result<(ValueTable, SubjectStateStore), String> {
        let mut seen = HashSet::with_capacity(self.value_table.len());
        let mut table = ValueTable::new();
        for record in self.value_table {
            if !record.value.is_finite() {
                return Err(format!(
                    "non-finite value for ({}, {}, {})",
                    record.subject, record.level, record.action
                ));
            }
            let key = ValueKey::new(record.subject, record.level, record.action);
            if !seen.insert(key.clone()) {
                return Err(format!(
                    "duplicate entry for ({}, {}, {})",
                    key.subject, key.level, key.action
                ));
            }
            table.write(key.subject, key.level, key.action, record.value);
        }
        let levels = self.subject_levels.into_iter().collect();
        Ok((table, levels))
    }
}

/// Owner of the state file. Writes are full rewrites swapped in by rename.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Points the store at `path`. Nothing is read or created yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// State file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the state file.
    ///
    /// Returns `Ok(None)` when the file does not exist or is blank; every other
    /// problem (I/O, syntax, malformed or duplicate cells) is a [`StateLoadError`].
    pub fn load(&self) -> Result<Option<(ValueTable, SubjectStateStore)>, StateLoadError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StateLoadError::new(&self.path, err.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let file: StateFile = serde_json::from_str(&raw)
            .map_err(|err| StateLoadError::new(&self.path, err.to_string()))?;
        file.restore()
            .map(Some)
            .map_err(|reason| StateLoadError::new(&self.path, reason))
    }

    /// Rewrites the whole state file atomically.
    ///
    /// Non-finite cells are refused before anything touches the disk, since JSON
    /// cannot represent them and the file would no longer load.
    pub fn save(
        &self,
        table: &ValueTable,
        levels: &SubjectStateStore,
    ) -> Result<(), PersistenceError> {
        let snapshot = StateFile::capture(table, levels);
        if let Some(record) = snapshot.value_table.iter().find(|r| !r.value.is_finite()) {
            return Err(PersistenceError::NonFiniteValue {
                subject: record.subject.clone(),
                level: record.level,
                action: record.action,
                value: record.value,
            });
        }
        let payload =
            serde_json::to_vec_pretty(&snapshot).map_err(|source| PersistenceError::StateEncode {
                path: self.path.clone(),
                source,
            })?;
        atomic_write(&self.path, &payload).map_err(|source| PersistenceError::StateWrite {
            path: self.path.clone(),
            source,
        })
    }
}

/// Writes to a sibling temp file, syncs it, then renames it over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state.json".into());
    let tmp_path = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let written = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(data)?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> (ValueTable, SubjectStateStore) {
        let mut table = ValueTable::new();
        table.write("Math", PerformanceLevel::Medium, Action::Same, 0.591);
        table.write("Data, Structures|2", PerformanceLevel::Weak, Action::Increase, -0.25);
        let mut levels = SubjectStateStore::new();
        levels.set_level("Math", PerformanceLevel::Strong);
        levels.set_level("Data, Structures|2", PerformanceLevel::Weak);
        (table, levels)
    }

    #[test]
    fn missing_or_blank_file_means_fresh_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("rl_state.json"));
        assert!(store.load().unwrap().is_none());
        fs::write(store.path(), "  \n").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn round_trips_table_and_levels() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state").join("rl_state.json"));
        let (table, levels) = sample();
        store.save(&table, &levels).unwrap();
        let (loaded_table, loaded_levels) = store.load().unwrap().unwrap();
        assert_eq!(loaded_table, table);
        assert_eq!(loaded_levels, levels);
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("rl_state.json"));
        let (table, levels) = sample();
        store.save(&table, &levels).unwrap();
        store.save(&table, &levels).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("rl_state.json")]);
    }

    #[test]
    fn syntax_errors_surface_with_the_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rl_state.json");
        fs::write(&path, "{\"value_table\": [").unwrap();
        let err = StateStore::new(&path).load().unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn malformed_keys_are_not_masked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rl_state.json");
        let bad_level = r#"{"value_table":[{"subject":"Math","level":7,"action":"same","value":1.0}],"subject_levels":{}}"#;
        fs::write(&path, bad_level).unwrap();
        assert!(StateStore::new(&path).load().is_err());

        let bad_action = r#"{"value_table":[{"subject":"Math","level":1,"action":"jump","value":1.0}],"subject_levels":{}}"#;
        fs::write(&path, bad_action).unwrap();
        assert!(StateStore::new(&path).load().is_err());

        let bad_subject_level = r#"{"value_table":[],"subject_levels":{"Math":5}}"#;
        fs::write(&path, bad_subject_level).unwrap();
        assert!(StateStore::new(&path).load().is_err());
    }

    #[test]
    fn duplicate_cells_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rl_state.json");
        let duplicated = r#"{"value_table":[
            {"subject":"Math","level":1,"action":"same","value":1.0},
            {"subject":"Math","level":1,"action":"same","value":2.0}
        ],"subject_levels":{}}"#;
        fs::write(&path, duplicated).unwrap();
        let err = StateStore::new(&path).load().unwrap_err();
        assert!(err.reason.contains("duplicate"));
    }

    #[test]
    fn non_finite_cells_never_reach_the_disk() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("rl_state.json"));
        let (mut table, levels) = sample();
        store.save(&table, &levels).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        table.write("Math", PerformanceLevel::Medium, Action::Decrease, f64::INFINITY);
        assert!(matches!(
            store.save(&table, &levels),
            Err(PersistenceError::NonFiniteValue { action: Action::Decrease, .. })
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
        assert!(store.load().unwrap().is_some());
    }

    #[test]
    fn file_layout_is_flat_records() {
        let (table, levels) = sample();
        let json = serde_json::to_value(StateFile::capture(&table, &levels)).unwrap();
        let first = &json["value_table"][0];
        assert!(first.get("subject").is_some());
        assert!(first.get("level").unwrap().is_u64());
        assert_eq!(json["subject_levels"]["Math"], 2);
    }
}

use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;

use crate::{JsonLogger, LogLevel, LogRecord};

/// Builder for [`Telemetry`] handles.
pub struct TelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
}

impl TelemetryBuilder {
    /// Creates the builder for the named component.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Debug,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Drops records below this level.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Builds the telemetry handle, opening the log file if one was configured.
    pub fn build(self) -> Result<Telemetry> {
        let logger = match self.log_path {
            Some(path) => Some(JsonLogger::new(path)?),
            None => None,
        };
        Ok(Telemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                min_level: self.min_level,
            }),
        })
    }
}

/// Cheaply cloneable logging handle shared across components.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    min_level: LogLevel,
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("module", &self.inner.module)
            .field("min_level", &self.inner.min_level)
            .finish()
    }
}

impl Telemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> TelemetryBuilder {
        TelemetryBuilder::new(module)
    }

    /// Returns a handle sharing this one's sink but reporting under another module name.
    #[must_use]
    pub fn scoped(&self, module: impl Into<String>) -> Self {
        let logger = self
            .inner
            .logger
            .as_ref()
            .and_then(|logger| JsonLogger::new(logger.path()).ok());
        Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                logger,
                min_level: self.inner.min_level,
            }),
        }
    }

    /// Module name records are emitted under.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Logs a structured event if it passes the level filter.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if level < self.inner.min_level {
            return Ok(());
        }
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn filters_below_min_level() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("studyflow.log");
        let telemetry = Telemetry::builder("learning")
            .log_path(&path)
            .min_level(LogLevel::Info)
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Debug, "learning.value.updated", json!({ "q": 0.3 }))
            .unwrap();
        telemetry
            .log(LogLevel::Info, "learning.state.loaded", json!({ "entries": 3 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("learning.value.updated"));
        assert!(content.contains("learning.state.loaded"));
    }

    #[test]
    fn scoped_handle_shares_the_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("studyflow.log");
        let learning = Telemetry::builder("learning").log_path(&path).build().unwrap();
        let planning = learning.scoped("planning");
        planning
            .log(LogLevel::Info, "planning.plan.generated", json!({}))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"module\":\"planning\""));
    }

    #[test]
    fn sinkless_handle_is_a_no_op() {
        let telemetry = Telemetry::builder("quiet").build().unwrap();
        assert!(telemetry.log(LogLevel::Error, "x", json!({})).is_ok());
        assert_eq!(telemetry.module(), "quiet");
    }
}

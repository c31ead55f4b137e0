use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use studyflow_learning::{ConfigError, EngineConfig};

use crate::availability::{default_day_start, AvailabilityEstimator, SlotClock};

/// Day-shape parameters for availability and class slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Hours awake per day.
    pub total_wake_hours: f64,
    /// Hours reserved for meals, travel, and rest.
    pub buffer_hours: f64,
    /// Length of one class slot.
    pub slot_minutes: u32,
    /// Start of the first class slot, `HH:MM`.
    #[serde(with = "hhmm")]
    pub day_start: NaiveTime,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            total_wake_hours: 16.0,
            buffer_hours: 3.0,
            slot_minutes: 50,
            day_start: default_day_start(),
        }
    }
}

impl PlannerConfig {
    /// Rejects negative or non-finite hours and empty slots.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("total_wake_hours", self.total_wake_hours),
            ("buffer_hours", self.buffer_hours),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidHours { name, value });
            }
        }
        if self.slot_minutes == 0 {
            return Err(ConfigError::InvalidHours {
                name: "slot_minutes",
                value: 0.0,
            });
        }
        Ok(())
    }

    /// Estimator using the configured buffer.
    #[must_use]
    pub const fn estimator(&self) -> AvailabilityEstimator {
        AvailabilityEstimator::new(self.buffer_hours)
    }

    /// Slot clock using the configured day start and slot length.
    #[must_use]
    pub const fn clock(&self) -> SlotClock {
        SlotClock::new(self.day_start, self.slot_minutes)
    }
}

/// File locations used by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    /// Learner state file.
    pub state_file: PathBuf,
    /// Append-only feedback audit log.
    pub audit_log: PathBuf,
    /// Optional JSON-lines log file.
    pub log_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("studyflow/rl_state.json"),
            audit_log: PathBuf::from("studyflow/audit.csv"),
            log_file: None,
        }
    }
}

impl PathsConfig {
    fn resolve_against(&mut self, base: &Path) {
        for path in [&mut self.state_file, &mut self.audit_log]
            .into_iter()
            .chain(self.log_file.as_mut())
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

/// Complete runtime configuration, as read from `studyflow.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StudyflowConfig {
    /// Learner parameters.
    pub engine: EngineConfig,
    /// Day shape.
    pub planner: PlannerConfig,
    /// File locations.
    pub paths: PathsConfig,
}

impl StudyflowConfig {
    /// Loads and validates a TOML document. Relative paths are resolved against
    /// the document's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| document_error(path, &err))?;
        let mut config = Self::from_toml(&raw).map_err(|err| match err {
            ConfigError::Document { reason, .. } => ConfigError::Document {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.paths.resolve_against(base);
        Ok(config)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(document_error(path, &err)),
        }
    }

    /// Parses and validates a TOML string. Paths are left as written.
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|err| ConfigError::Document {
            path: PathBuf::new(),
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.planner.validate()
    }
}

fn document_error(path: &Path, err: &io::Error) -> ConfigError {
    ConfigError::Document {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyflow_learning::{CreditAssignment, LevelPolicy};
    use tempfile::tempdir;

    #[test]
    fn empty_document_gives_defaults() {
        let config = StudyflowConfig::from_toml("").unwrap();
        assert_eq!(config, StudyflowConfig::default());
        assert_eq!(config.planner.day_start.format("%H:%M").to_string(), "08:00");
    }

    #[test]
    fn reads_every_section() {
        let config = StudyflowConfig::from_toml(
            r#"
            [engine]
            exploration = 0.0
            max_hours = 3.0
            credit_assignment = "selected_action"
            seed = 42

            [engine.level_policy]
            kind = "score_bands"
            weak_below = 60.0

            [planner]
            total_wake_hours = 15.0
            slot_minutes = 45
            day_start = "09:15"

            [paths]
            log_file = "logs/studyflow.jsonl"
            "#,
        )
        .unwrap();
        assert!(config.engine.exploration.abs() < f64::EPSILON);
        assert!((config.engine.max_hours - 3.0).abs() < f64::EPSILON);
        assert!((config.engine.learning_rate - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.engine.credit_assignment, CreditAssignment::SelectedAction);
        assert_eq!(
            config.engine.level_policy,
            LevelPolicy::ScoreBands {
                weak_below: 60.0,
                strong_from: 85.0
            }
        );
        assert_eq!(config.engine.seed, Some(42));
        assert_eq!(config.planner.slot_minutes, 45);
        assert_eq!(config.planner.clock().slots_for_day(1)[0].to_string(), "09:15-10:00");
        assert!((config.planner.buffer_hours - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            StudyflowConfig::from_toml("[engine]\nmin_hours = 5.0\nmax_hours = 1.0"),
            Err(ConfigError::InvertedBounds { .. })
        ));
        assert!(matches!(
            StudyflowConfig::from_toml("[planner]\nbuffer_hours = -1.0"),
            Err(ConfigError::InvalidHours { .. })
        ));
        assert!(matches!(
            StudyflowConfig::from_toml("[planner]\nday_start = \"8am\""),
            Err(ConfigError::Document { .. })
        ));
    }

    #[test]
    fn relative_paths_follow_the_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("studyflow.toml");
        fs::write(
            &path,
            "[paths]\nstate_file = \"data/state.json\"\naudit_log = \"/var/tmp/audit.csv\"\n",
        )
        .unwrap();
        let config = StudyflowConfig::load(&path).unwrap();
        assert_eq!(config.paths.state_file, dir.path().join("data/state.json"));
        assert_eq!(config.paths.audit_log, PathBuf::from("/var/tmp/audit.csv"));
        assert_eq!(config.paths.log_file, None);
    }

    #[test]
    fn missing_file_is_only_an_error_when_required() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            StudyflowConfig::load(&path),
            Err(ConfigError::Document { .. })
        ));
        assert_eq!(
            StudyflowConfig::load_or_default(&path).unwrap(),
            StudyflowConfig::default()
        );
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[engine\n").unwrap();
        match StudyflowConfig::load(&path) {
            Err(ConfigError::Document { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected {other:?}"),
        }
    }
}

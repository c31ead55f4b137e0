use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use shared_logging::CsvLedger;
use studyflow_learning::{Action, PerformanceLevel, PersistenceError};

/// Audit columns, in file order.
pub const AUDIT_COLUMNS: [&str; 8] = [
    "date",
    "subject",
    "prior_hours",
    "new_hours",
    "completion_label",
    "reward",
    "state",
    "action",
];

/// Immutable record of one feedback event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Day the feedback was applied.
    pub date: NaiveDate,
    /// Subject the feedback is about.
    pub subject: String,
    /// Hours allocated before the day.
    pub prior_hours: f64,
    /// Hours carried forward.
    pub new_hours: f64,
    /// Normalized completion label.
    pub completion_label: String,
    /// Reward fed to the learner.
    pub reward: f64,
    /// Level the update was applied at.
    pub state: PerformanceLevel,
    /// Action the reward was credited to.
    pub action: Action,
}

impl AuditRecord {
    /// CSV fields in [`AUDIT_COLUMNS`] order.
    #[must_use]
    pub fn to_row(&self) -> [String; 8] {
        [
            self.date.format("%Y-%m-%d").to_string(),
            self.subject.clone(),
            format_number(self.prior_hours),
            format_number(self.new_hours),
            self.completion_label.clone(),
            format_number(self.reward),
            self.state.code().to_string(),
            self.action.label().to_owned(),
        ]
    }
}

/// Shortest decimal form, always carrying a fractional part (`3.0`, `4.84`, `-1.0`).
#[allow(clippy::float_cmp)]
fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Append-only audit log. Rows are never rewritten or removed.
#[derive(Debug, Clone)]
pub struct AuditLog {
    ledger: CsvLedger,
}

impl AuditLog {
    /// Opens the log, writing the header row if the file is new.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        CsvLedger::open(&path, AUDIT_COLUMNS)
            .map(|ledger| Self { ledger })
            .map_err(|err| PersistenceError::AuditAppend {
                path,
                reason: format!("{err:#}"),
            })
    }

    /// Appends one record.
    pub fn append(&self, record: &AuditRecord) -> Result<(), PersistenceError> {
        self.ledger
            .append(&record.to_row())
            .map_err(|err| PersistenceError::AuditAppend {
                path: self.ledger.path().to_path_buf(),
                reason: format!("{err:#}"),
            })
    }

    /// Log location.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.ledger.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(subject: &str) -> AuditRecord {
        AuditRecord {
            date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            subject: subject.into(),
            prior_hours: 4.84,
            new_hours: 4.84,
            completion_label: "not".into(),
            reward: -1.0,
            state: PerformanceLevel::Medium,
            action: Action::Same,
        }
    }

    #[test]
    fn writes_header_then_rows() {
        let dir = tempdir().unwrap();
        let log = AuditLog::open(dir.path().join("audit.csv")).unwrap();
        log.append(&record("Math")).unwrap();
        log.append(&record("Data, Structures")).unwrap();
        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "date,subject,prior_hours,new_hours,completion_label,reward,state,action"
        );
        assert_eq!(lines[1], "2026-10-19,Math,4.84,4.84,not,-1.0,1,same");
        assert_eq!(lines[2], "2026-10-19,\"Data, Structures\",4.84,4.84,not,-1.0,1,same");
    }

    #[test]
    fn numeric_columns_share_one_format() {
        let mut whole = record("Math");
        whole.prior_hours = 3.5;
        whole.new_hours = 3.0;
        whole.reward = 0.0;
        let row = whole.to_row();
        assert_eq!(&row[2..6], ["3.5", "3.0", "not", "0.0"]);
        assert_eq!(format_number(-1.0), "-1.0");
        assert_eq!(format_number(4.835), "4.835");
    }

    #[test]
    fn reopening_does_not_repeat_the_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.csv");
        AuditLog::open(&path).unwrap().append(&record("Math")).unwrap();
        AuditLog::open(&path).unwrap().append(&record("CS")).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("completion_label").count(), 1);
        assert_eq!(content.lines().count(), 3);
    }
}

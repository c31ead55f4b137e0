//! Completion feedback: label → reward, the learner update, and the audit trail.

use std::{collections::HashMap, fmt};

use chrono::{Local, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use studyflow_learning::{Action, CreditAssignment, EngineError, QLearner};

use crate::generator::DailyPlan;

/// Append-only audit log.
pub mod audit;

pub use audit::{AuditLog, AuditRecord, AUDIT_COLUMNS};

/// Label assumed for subjects with no reported outcome.
pub const DEFAULT_LABEL: &str = "half";

/// Reported outcome for one subject's study block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Completion {
    /// Time was not used.
    Not,
    /// Time was partly used.
    Half,
    /// Time was used. Any unrecognized label lands here.
    Done,
}

impl Completion {
    /// Classifies a raw label, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match normalize_label(label).as_str() {
            "not" => Self::Not,
            "half" => Self::Half,
            _ => Self::Done,
        }
    }

    /// Reward fed to the learner.
    #[must_use]
    pub const fn reward(self) -> f64 {
        match self {
            Self::Not => -1.0,
            Self::Half => 0.0,
            Self::Done => 1.0,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Not => "not",
            Self::Half => "half",
            Self::Done => "done",
        })
    }
}

/// Lowercased, trimmed label as written to the audit log.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Turns completion reports into learner updates and audit rows.
#[derive(Debug, Clone)]
pub struct FeedbackProcessor {
    audit: Option<AuditLog>,
    credit: CreditAssignment,
    fixed_date: Option<NaiveDate>,
    telemetry: Option<Telemetry>,
}

impl FeedbackProcessor {
    /// Processor writing to `audit`. `None` keeps records in memory only.
    #[must_use]
    pub const fn new(audit: Option<AuditLog>, credit: CreditAssignment) -> Self {
        Self {
            audit,
            credit,
            fixed_date: None,
            telemetry: None,
        }
    }

    /// Stamps every record with `date` instead of today's local date.
    #[must_use]
    pub const fn with_fixed_date(mut self, date: NaiveDate) -> Self {
        self.fixed_date = Some(date);
        self
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Credit policy in use.
    #[must_use]
    pub const fn credit(&self) -> CreditAssignment {
        self.credit
    }

    /// Audit log, when one is attached.
    #[must_use]
    pub const fn audit(&self) -> Option<&AuditLog> {
        self.audit.as_ref()
    }

    /// Rewards the subject's `Same` action at its current level and appends a record.
    pub fn apply(
        &self,
        learner: &mut QLearner,
        subject: &str,
        prior_hours: f64,
        new_hours: f64,
        completion_label: &str,
    ) -> Result<AuditRecord, EngineError> {
        self.apply_with_action(
            learner,
            subject,
            prior_hours,
            new_hours,
            completion_label,
            Action::Same,
        )
    }

    /// Like [`apply`](Self::apply) but credits `action`.
    pub fn apply_with_action(
        &self,
        learner: &mut QLearner,
        subject: &str,
        prior_hours: f64,
        new_hours: f64,
        completion_label: &str,
        action: Action,
    ) -> Result<AuditRecord, EngineError> {
        let completion = Completion::parse(completion_label);
        let reward = completion.reward();
        let state = learner.level(subject);
        let value = learner.update(subject, state, action, reward, None)?;

        let record = AuditRecord {
            date: self.today(),
            subject: subject.to_owned(),
            prior_hours,
            new_hours,
            completion_label: normalize_label(completion_label),
            reward,
            state,
            action,
        };
        if let Some(audit) = &self.audit {
            audit.append(&record)?;
        }
        self.log(
            LogLevel::Info,
            "planning.feedback.applied",
            json!({
                "subject": subject,
                "completion": completion,
                "reward": reward,
                "state": state.code(),
                "action": action.label(),
                "value": value,
            }),
        );
        Ok(record)
    }

    /// Applies feedback to every subject of `allocation`, defaulting missing labels to `"half"`.
    pub fn apply_for_day(
        &self,
        learner: &mut QLearner,
        allocation: &IndexMap<String, f64>,
        completions: &HashMap<String, String>,
    ) -> Result<Vec<AuditRecord>, EngineError> {
        allocation
            .iter()
            .map(|(subject, hours)| {
                let label = completions
                    .get(subject)
                    .map_or(DEFAULT_LABEL, String::as_str);
                self.apply(learner, subject, *hours, *hours, label)
            })
            .collect()
    }

    /// Applies feedback for a stored plan.
    ///
    /// Under [`CreditAssignment::SelectedAction`] the reward goes to the action the
    /// plan recorded for each subject; otherwise this matches
    /// [`apply_for_day`](Self::apply_for_day).
    pub fn apply_plan(
        &self,
        learner: &mut QLearner,
        plan: &DailyPlan,
        completions: &HashMap<String, String>,
    ) -> Result<Vec<AuditRecord>, EngineError> {
        plan.allocation
            .iter()
            .map(|(subject, hours)| {
                let label = completions
                    .get(subject)
                    .map_or(DEFAULT_LABEL, String::as_str);
                let action = match self.credit {
                    CreditAssignment::Same => Action::Same,
                    CreditAssignment::SelectedAction => {
                        plan.actions.get(subject).copied().unwrap_or(Action::Same)
                    }
                };
                self.apply_with_action(learner, subject, *hours, *hours, label, action)
            })
            .collect()
    }

    fn today(&self) -> NaiveDate {
        self.fixed_date.unwrap_or_else(|| Local::now().date_naive())
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

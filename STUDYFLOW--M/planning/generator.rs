use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use studyflow_learning::{Action, QLearner};
use uuid::Uuid;

use crate::{adjuster::HourAdjuster, availability::AvailabilityEstimator, helper::round_hours};

/// One day's allocation, ordered as the subjects were supplied.
///
/// Callers persist this and hand it back for feedback unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyPlan {
    /// Plan identifier.
    pub id: Uuid,
    /// Creation timestamp.
    pub generated_at: DateTime<Utc>,
    /// Study budget the allocation was normalized to.
    pub available_hours: f64,
    /// Subject → hours.
    pub allocation: IndexMap<String, f64>,
    /// Subject → action picked while adjusting.
    #[serde(default)]
    pub actions: IndexMap<String, Action>,
}

impl DailyPlan {
    fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            available_hours: 0.0,
            allocation: IndexMap::new(),
            actions: IndexMap::new(),
        }
    }

    /// Sum of allocated hours.
    #[must_use]
    pub fn total_hours(&self) -> f64 {
        self.allocation.values().sum()
    }

    /// Hours for `subject`, if scheduled.
    #[must_use]
    pub fn hours(&self, subject: &str) -> Option<f64> {
        self.allocation.get(subject).copied()
    }

    /// Whether no subject was scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocation.is_empty()
    }
}

/// Splits the day's availability across subjects and renormalizes after adjustment.
#[derive(Debug, Clone)]
pub struct PlanGenerator {
    estimator: AvailabilityEstimator,
    adjuster: HourAdjuster,
    telemetry: Option<Telemetry>,
}

impl PlanGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new(estimator: AvailabilityEstimator, adjuster: HourAdjuster) -> Self {
        Self {
            estimator,
            adjuster,
            telemetry: None,
        }
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Availability estimator in use.
    #[must_use]
    pub const fn estimator(&self) -> &AvailabilityEstimator {
        &self.estimator
    }

    /// Builds the plan for one day.
    ///
    /// Repeated subjects are scheduled once. The allocation sums to the available
    /// budget within `0.01` hours per subject.
    pub fn generate<S, R>(
        &self,
        learner: &QLearner,
        subjects: &[S],
        class_hours_today: f64,
        total_wake_hours: f64,
        rng: &mut R,
    ) -> DailyPlan
    where
        S: AsRef<str>,
        R: Rng + ?Sized,
    {
        let subjects: IndexSet<&str> = subjects.iter().map(AsRef::as_ref).collect();
        if subjects.is_empty() {
            return DailyPlan::empty();
        }

        let available = self.estimator.estimate(total_wake_hours, class_hours_today);
        #[allow(clippy::cast_precision_loss)]
        let count = subjects.len() as f64;
        let base = available / count;

        let mut raw = IndexMap::with_capacity(subjects.len());
        let mut actions = IndexMap::with_capacity(subjects.len());
        for subject in &subjects {
            let (hours, action) = self.adjuster.adjust(learner, subject, base, rng);
            raw.insert((*subject).to_owned(), hours);
            actions.insert((*subject).to_owned(), action);
        }

        let total_raw: f64 = raw.values().sum();
        let allocation: IndexMap<String, f64> = if total_raw > 0.0 {
            let factor = available / total_raw;
            raw.into_iter()
                .map(|(subject, hours)| (subject, round_hours(hours * factor)))
                .collect()
        } else {
            let equal = round_hours(base);
            raw.into_keys().map(|subject| (subject, equal)).collect()
        };

        let plan = DailyPlan {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            available_hours: available,
            allocation,
            actions,
        };
        self.log(
            LogLevel::Info,
            "planning.plan.generated",
            json!({
                "plan_id": plan.id,
                "subjects": plan.allocation.len(),
                "available_hours": available,
                "raw_total": total_raw,
                "allocated": plan.total_hours(),
                "actions": plan.actions,
            }),
        );
        plan
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

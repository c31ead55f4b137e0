use std::collections::HashMap;

use indexmap::IndexMap;
use rand::{rngs::SmallRng, SeedableRng};
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};
use studyflow_learning::{EngineError, PerformanceLevel, QLearner};

use crate::{
    adjuster::HourAdjuster,
    availability::{SlotClock, TimeSlot},
    config::StudyflowConfig,
    feedback::{AuditLog, AuditRecord, FeedbackProcessor},
    generator::{DailyPlan, PlanGenerator},
};

/// Top-level runtime: one learner, one audit log, one random source.
///
/// Single-threaded; every mutating call persists before it returns.
#[derive(Debug)]
pub struct StudyPlanner {
    config: StudyflowConfig,
    learner: QLearner,
    generator: PlanGenerator,
    feedback: FeedbackProcessor,
    clock: SlotClock,
    rng: SmallRng,
    telemetry: Option<Telemetry>,
}

impl StudyPlanner {
    /// Validates `config`, loads learner state, and opens the audit log.
    pub fn open(config: StudyflowConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let telemetry = config.paths.log_file.as_ref().and_then(|path| {
            Telemetry::builder("studyflow")
                .log_path(path)
                .build()
                .ok()
        });

        let learner = QLearner::open_with_telemetry(
            config.engine.clone(),
            &config.paths.state_file,
            telemetry.as_ref().map(|t| t.scoped("studyflow.learning")),
        )?;
        let mut generator = PlanGenerator::new(
            config.planner.estimator(),
            HourAdjuster::from_config(&config.engine)?,
        );
        let mut feedback = FeedbackProcessor::new(
            Some(AuditLog::open(&config.paths.audit_log)?),
            config.engine.credit_assignment,
        );
        if let Some(telemetry) = &telemetry {
            let planning = telemetry.scoped("studyflow.planning");
            generator = generator.with_telemetry(planning.clone());
            feedback = feedback.with_telemetry(planning);
        }
        let rng = config
            .engine
            .seed
            .map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);

        Ok(Self {
            clock: config.planner.clock(),
            config,
            learner,
            generator,
            feedback,
            rng,
            telemetry,
        })
    }

    /// Replaces the feedback processor, e.g. to pin the audit date.
    #[must_use]
    pub fn with_feedback(mut self, feedback: FeedbackProcessor) -> Self {
        self.feedback = feedback;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &StudyflowConfig {
        &self.config
    }

    /// Underlying learner.
    #[must_use]
    pub const fn learner(&self) -> &QLearner {
        &self.learner
    }

    /// Feedback processor in use.
    #[must_use]
    pub const fn feedback(&self) -> &FeedbackProcessor {
        &self.feedback
    }

    /// The first `count` class slots of the day.
    #[must_use]
    pub fn slots(&self, count: u32) -> Vec<TimeSlot> {
        self.clock.slots_for_day(count)
    }

    /// Plans a day with `class_slots` timetable slots and the configured wake budget.
    pub fn plan_for_slots<S: AsRef<str>>(&mut self, subjects: &[S], class_slots: u32) -> DailyPlan {
        let class_hours = self.clock.class_hours(class_slots);
        let total_wake_hours = self.config.planner.total_wake_hours;
        self.plan_for_class_hours(subjects, class_hours, total_wake_hours)
    }

    /// Plans a day from explicit class and wake hours.
    pub fn plan_for_class_hours<S: AsRef<str>>(
        &mut self,
        subjects: &[S],
        class_hours_today: f64,
        total_wake_hours: f64,
    ) -> DailyPlan {
        self.generator.generate(
            &self.learner,
            subjects,
            class_hours_today,
            total_wake_hours,
            &mut self.rng,
        )
    }

    /// Feeds a day's outcomes back, one update and audit row per allocated subject.
    pub fn apply_feedback_for_day(
        &mut self,
        allocation: &IndexMap<String, f64>,
        completions: &HashMap<String, String>,
    ) -> Result<Vec<AuditRecord>, EngineError> {
        self.feedback
            .apply_for_day(&mut self.learner, allocation, completions)
    }

    /// Feeds outcomes for a stored plan back, honoring the credit policy.
    pub fn apply_plan_feedback(
        &mut self,
        plan: &DailyPlan,
        completions: &HashMap<String, String>,
    ) -> Result<Vec<AuditRecord>, EngineError> {
        self.feedback.apply_plan(&mut self.learner, plan, completions)
    }

    /// Sets a subject's level from a raw integer (clamped into `0..=2`).
    pub fn set_level(&mut self, subject: &str, raw_level: i64) -> Result<PerformanceLevel, EngineError> {
        Ok(self.learner.set_level(subject, raw_level)?)
    }

    /// Routes an average score through the configured level policy.
    pub fn observe_score(
        &mut self,
        subject: &str,
        average_score: f64,
    ) -> Result<Option<PerformanceLevel>, EngineError> {
        let level = self.learner.observe_score(subject, average_score)?;
        self.log(
            LogLevel::Info,
            "planning.level.observed",
            json!({
                "subject": subject,
                "score": average_score,
                "level": level.map(PerformanceLevel::code),
            }),
        );
        Ok(level)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

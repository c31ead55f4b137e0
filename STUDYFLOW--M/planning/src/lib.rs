#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Studyflow planning: turns the day's free time into a per-subject study plan using
//! the learner's preferences, then feeds completion outcomes back into it.

/// Availability estimation and the class-slot clock.
#[path = "../availability.rs"]
pub mod availability;
/// Bounded, policy-driven hour adjustment.
#[path = "../adjuster.rs"]
pub mod adjuster;
/// Runtime configuration document.
#[path = "../config.rs"]
pub mod config;
/// Completion feedback and the audit log.
#[path = "../feedback/main.rs"]
pub mod feedback;
/// Daily plan generation and normalization.
#[path = "../generator.rs"]
pub mod generator;
/// Rounding and display helpers.
#[path = "../helper.rs"]
pub mod helper;
/// Planner runtime entry point.
#[path = "../main.rs"]
pub mod orchestration_entry;

pub use adjuster::HourAdjuster;
pub use availability::{estimate_available, AvailabilityEstimator, SlotClock, TimeSlot, MIN_STUDY_HOURS};
pub use config::{PathsConfig, PlannerConfig, StudyflowConfig};
pub use feedback::{
    normalize_label, AuditLog, AuditRecord, Completion, FeedbackProcessor, AUDIT_COLUMNS,
    DEFAULT_LABEL,
};
pub use generator::{DailyPlan, PlanGenerator};
pub use helper::{format_hours, round_hours};
pub use orchestration_entry::StudyPlanner;

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Studyflow learning core: per-subject performance levels, the sparse action-value
//! table, epsilon-greedy selection, temporal-difference updates, and crash-safe
//! persistence of all of it.

/// Engine configuration and policy knobs.
#[path = "../config.rs"]
pub mod config;

/// Error types shared by the learning and planning crates.
#[path = "../errors.rs"]
pub mod errors;

/// Performance levels and the per-subject level store.
#[path = "../levels.rs"]
pub mod levels;

/// Actions and the sparse action-value table.
#[path = "../value_table.rs"]
pub mod value_table;

/// Action selection and value updates.
#[path = "../policy/main.rs"]
pub mod policy;

/// State-file encoding and atomic persistence.
#[path = "../persistence.rs"]
pub mod persistence;

/// Learner tying table, levels, policy, and persistence together.
#[path = "../agent.rs"]
pub mod agent;

pub use agent::{LearnerSnapshot, QLearner};
pub use config::{CreditAssignment, EngineConfig, LevelPolicy};
pub use errors::{ConfigError, EngineError, PersistenceError, StateLoadError};
pub use levels::{PerformanceLevel, SubjectStateStore};
pub use persistence::{StateFile, StateStore, ValueRecord};
pub use policy::{ActionSelector, ValueUpdater};
pub use value_table::{Action, ValueKey, ValueTable};

use std::path::PathBuf;

use thiserror::Error;

use crate::{levels::PerformanceLevel, value_table::Action};

/// Invalid engine or planner configuration. Raised at construction, never clamped.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A rate fell outside its valid interval.
    #[error("{name} must be in {range}, got {value}")]
    RateOutOfRange {
        /// Parameter name (`learning_rate`, `discount`, `exploration`).
        name: &'static str,
        /// Human readable interval.
        range: &'static str,
        /// Offending value.
        value: f64,
    },
    /// `min_hours` exceeds `max_hours`.
    #[error("min_hours ({min}) must not exceed max_hours ({max})")]
    InvertedBounds {
        /// Configured lower bound.
        min: f64,
        /// Configured upper bound.
        max: f64,
    },
    /// An hour quantity was negative or not finite.
    #[error("{name} must be a finite, non-negative number of hours, got {value}")]
    InvalidHours {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// Score bands overlap or are not finite.
    #[error("score bands require weak_below ({weak_below}) <= strong_from ({strong_from})")]
    InvalidScoreBands {
        /// Upper bound (exclusive) of the weak band.
        weak_below: f64,
        /// Lower bound (inclusive) of the strong band.
        strong_from: f64,
    },
    /// A configuration document could not be read or parsed.
    #[error("invalid configuration document {path}: {reason}")]
    Document {
        /// Document location.
        path: PathBuf,
        /// Parser or I/O message.
        reason: String,
    },
}

/// The state file exists and is non-empty but cannot be trusted.
#[derive(Debug, Error)]
#[error("failed to load learner state from {path}: {reason}")]
pub struct StateLoadError {
    /// File that failed to load.
    pub path: PathBuf,
    /// What was wrong with it.
    pub reason: String,
}

impl StateLoadError {
    /// Creates the error for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A durable write failed. In-memory state stays valid but the file on disk is stale.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Writing, syncing, or renaming the state file failed.
    #[error("failed to persist learner state to {path}: {source}")]
    StateWrite {
        /// Target state file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The state could not be encoded.
    #[error("failed to encode learner state for {path}: {source}")]
    StateEncode {
        /// Target state file.
        path: PathBuf,
        /// Serializer failure.
        #[source]
        source: serde_json::Error,
    },
    /// A NaN or infinite value was offered for the value table.
    #[error("refusing non-finite value {value} for ({subject}, {level}, {action})")]
    NonFiniteValue {
        /// Subject of the rejected cell.
        subject: String,
        /// Level of the rejected cell.
        level: PerformanceLevel,
        /// Action of the rejected cell.
        action: Action,
        /// Offending value.
        value: f64,
    },
    /// Appending an audit row failed.
    #[error("failed to append audit record to {path}: {reason}")]
    AuditAppend {
        /// Audit log location.
        path: PathBuf,
        /// Failure description.
        reason: String,
    },
}

/// Any failure surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Corrupt state file.
    #[error(transparent)]
    StateLoad(#[from] StateLoadError),
    /// Durable write failure.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

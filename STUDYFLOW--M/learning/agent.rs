use std::path::PathBuf;

use rand::Rng;
use serde::Serialize;
use serde_json::json;
use shared_logging::{LogLevel, Telemetry};

use crate::{
    config::EngineConfig,
    errors::{EngineError, PersistenceError},
    levels::{PerformanceLevel, SubjectStateStore},
    persistence::{StateFile, StateStore},
    policy::{ActionSelector, ValueUpdater},
    value_table::{Action, ValueTable},
};

/// Read-only view of everything the learner has stored.
#[derive(Debug, Clone, Serialize)]
pub struct LearnerSnapshot {
    /// State file path, when the learner is durable.
    pub state_path: Option<PathBuf>,
    /// Stored table cells and explicit levels.
    #[serde(flatten)]
    pub state: StateFile,
}

/// Tabular Q-learner over (subject, level, action).
///
/// Every mutating call rewrites the state file before returning. When that write
/// fails the in-memory change is kept and the caller receives a
/// [`PersistenceError`] telling it the file on disk is stale.
#[derive(Debug)]
pub struct QLearner {
    config: EngineConfig,
    table: ValueTable,
    levels: SubjectStateStore,
    selector: ActionSelector,
    updater: ValueUpdater,
    store: Option<StateStore>,
    telemetry: Option<Telemetry>,
}

impl QLearner {
    /// Opens a durable learner backed by `state_path`, loading prior state if any.
    pub fn open(config: EngineConfig, state_path: impl Into<PathBuf>) -> Result<Self, EngineError> {
        Self::open_with_telemetry(config, state_path, None)
    }

    /// Same as [`QLearner::open`], logging through `telemetry`.
    pub fn open_with_telemetry(
        config: EngineConfig,
        state_path: impl Into<PathBuf>,
        telemetry: Option<Telemetry>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let store = StateStore::new(state_path);
        let loaded = store.load()?;
        let fresh = loaded.is_none();
        let (table, levels) = loaded.unwrap_or_default();
        let learner = Self {
            selector: ActionSelector::new(config.exploration),
            updater: ValueUpdater::new(config.learning_rate, config.discount),
            config,
            table,
            levels,
            store: Some(store),
            telemetry,
        };
        learner.log(
            LogLevel::Info,
            "learning.state.loaded",
            json!({
                "path": learner.state_path(),
                "fresh": fresh,
                "cells": learner.table.len(),
                "subjects_with_level": learner.levels.len(),
            }),
        );
        Ok(learner)
    }

    /// Learner that never touches the filesystem.
    pub fn in_memory(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            selector: ActionSelector::new(config.exploration),
            updater: ValueUpdater::new(config.learning_rate, config.discount),
            config,
            table: ValueTable::new(),
            levels: SubjectStateStore::new(),
            store: None,
            telemetry: None,
        })
    }

    /// Attaches telemetry after construction.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State file path, if durable.
    #[must_use]
    pub fn state_path(&self) -> Option<&std::path::Path> {
        self.store.as_ref().map(StateStore::path)
    }

    /// In-memory value table.
    #[must_use]
    pub const fn table(&self) -> &ValueTable {
        &self.table
    }

    /// Current level for `subject` (`Medium` when never set).
    #[must_use]
    pub fn level(&self, subject: &str) -> PerformanceLevel {
        self.levels.get_level(subject)
    }

    /// Sets a level from a raw integer, clamped into `0..=2`, and persists.
    pub fn set_level(
        &mut self,
        subject: &str,
        raw_level: i64,
    ) -> Result<PerformanceLevel, PersistenceError> {
        let level = PerformanceLevel::from_clamped(raw_level);
        let previous = self.levels.set_level(subject, level);
        self.log(
            LogLevel::Info,
            "learning.level.set",
            json!({
                "subject": subject,
                "requested": raw_level,
                "level": level.code(),
                "previous": previous.map(PerformanceLevel::code),
            }),
        );
        self.persist()?;
        Ok(level)
    }

    /// Feeds an observed average score through the level policy.
    ///
    /// Under the manual policy nothing changes and `None` is returned.
    pub fn observe_score(
        &mut self,
        subject: &str,
        score: f64,
    ) -> Result<Option<PerformanceLevel>, PersistenceError> {
        match self.config.level_policy.classify(score) {
            Some(level) => self.set_level(subject, i64::from(level.code())).map(Some),
            None => Ok(None),
        }
    }

    /// Stored estimate, `0.0` for unseen keys.
    #[must_use]
    pub fn value(&self, subject: &str, level: PerformanceLevel, action: Action) -> f64 {
        self.table.read(subject, level, action)
    }

    /// Upserts one estimate and persists. NaN and infinities are refused untouched.
    pub fn write_value(
        &mut self,
        subject: &str,
        level: PerformanceLevel,
        action: Action,
        value: f64,
    ) -> Result<(), PersistenceError> {
        if !value.is_finite() {
            return Err(PersistenceError::NonFiniteValue {
                subject: subject.to_owned(),
                level,
                action,
                value,
            });
        }
        self.table.write(subject, level, action, value);
        self.persist()
    }

    /// Actions tied for the best estimate.
    #[must_use]
    pub fn best_actions(&self, subject: &str, level: PerformanceLevel) -> Vec<Action> {
        self.table.best_actions(subject, level)
    }

    /// Best action, ties broken randomly through `rng`.
    pub fn best_action<R: Rng + ?Sized>(
        &self,
        subject: &str,
        level: PerformanceLevel,
        rng: &mut R,
    ) -> Action {
        self.table.best_action(subject, level, rng)
    }

    /// Epsilon-greedy choice for (subject, level).
    pub fn select_action<R: Rng + ?Sized>(
        &self,
        subject: &str,
        level: PerformanceLevel,
        rng: &mut R,
    ) -> Action {
        self.selector.select(&self.table, subject, level, rng)
    }

    /// Applies the TD update for one transition, persists, and returns the new estimate.
    pub fn update(
        &mut self,
        subject: &str,
        level: PerformanceLevel,
        action: Action,
        reward: f64,
        next_level: Option<PerformanceLevel>,
    ) -> Result<f64, PersistenceError> {
        if !reward.is_finite() {
            return Err(PersistenceError::NonFiniteValue {
                subject: subject.to_owned(),
                level,
                action,
                value: reward,
            });
        }
        let old = self.table.read(subject, level, action);
        let new = self
            .updater
            .update(&mut self.table, subject, level, action, reward, next_level);
        self.log(
            LogLevel::Debug,
            "learning.value.updated",
            json!({
                "subject": subject,
                "level": level.code(),
                "action": action.label(),
                "reward": reward,
                "old": old,
                "new": new,
            }),
        );
        self.persist()?;
        Ok(new)
    }

    /// Rewrites the state file from memory. No-op for in-memory learners.
    pub fn save(&self) -> Result<(), PersistenceError> {
        self.persist()
    }

    /// Copy of the stored state, suitable for display.
    #[must_use]
    pub fn snapshot(&self) -> LearnerSnapshot {
        LearnerSnapshot {
            state_path: self.state_path().map(std::path::Path::to_path_buf),
            state: StateFile::capture(&self.table, &self.levels),
        }
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        store.save(&self.table, &self.levels).map_err(|err| {
            self.log(
                LogLevel::Error,
                "learning.persist.failed",
                json!({ "path": store.path(), "error": err.to_string() }),
            );
            err
        })
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

use rand::Rng;
use studyflow_learning::{Action, ConfigError, EngineConfig, QLearner};

use crate::helper::round_hours;

/// Converts a base hour figure into an adjusted one using the learner's policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourAdjuster {
    min_hours: f64,
    max_hours: f64,
    step: f64,
}

impl HourAdjuster {
    /// Creates an adjuster. Inverted or invalid bounds are rejected, not clamped.
    pub fn new(min_hours: f64, max_hours: f64, step: f64) -> Result<Self, ConfigError> {
        EngineConfig {
            min_hours,
            max_hours,
            step_size: step,
            ..EngineConfig::default()
        }
        .validate()?;
        Ok(Self {
            min_hours,
            max_hours,
            step,
        })
    }

    /// Adjuster using the bounds and step of `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(config.min_hours, config.max_hours, config.step_size)
    }

    /// Lower bound.
    #[must_use]
    pub const fn min_hours(&self) -> f64 {
        self.min_hours
    }

    /// Upper bound.
    #[must_use]
    pub const fn max_hours(&self) -> f64 {
        self.max_hours
    }

    /// Applies `action` to `base_hours`, keeping the result in `[min_hours, max_hours]`.
    ///
    /// The base is brought into bounds before stepping, so a step away from a
    /// bound still moves the result.
    #[must_use]
    pub fn apply(&self, action: Action, base_hours: f64) -> f64 {
        let base = base_hours.clamp(self.min_hours, self.max_hours);
        let moved = match action {
            Action::Decrease => base - self.step,
            Action::Same => base,
            Action::Increase => base + self.step,
        };
        round_hours(moved.clamp(self.min_hours, self.max_hours))
    }

    /// Looks up the subject's level, selects an action, and applies it.
    pub fn adjust<R: Rng + ?Sized>(
        &self,
        learner: &QLearner,
        subject: &str,
        base_hours: f64,
        rng: &mut R,
    ) -> (f64, Action) {
        let level = learner.level(subject);
        let action = learner.select_action(subject, level, rng);
        (self.apply(action, base_hours), action)
    }
}

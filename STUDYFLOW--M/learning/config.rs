use serde::{Deserialize, Serialize};

use crate::{errors::ConfigError, levels::PerformanceLevel};

/// Which action a completion signal is credited to.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CreditAssignment {
    /// Always reinforce `Same`, whatever action produced the hours.
    #[default]
    Same,
    /// Reinforce the action recorded in the plan when it is available.
    SelectedAction,
}

/// How subject performance levels change.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelPolicy {
    /// Levels change only through explicit `set_level` calls.
    #[default]
    Manual,
    /// Observed average scores are mapped onto levels.
    ScoreBands {
        /// Scores strictly below this are `Weak`.
        #[serde(default = "default_weak_below")]
        weak_below: f64,
        /// Scores at or above this are `Strong`.
        #[serde(default = "default_strong_from")]
        strong_from: f64,
    },
}

impl LevelPolicy {
    /// Score bands with the stock thresholds (70 / 85).
    #[must_use]
    pub const fn score_bands() -> Self {
        Self::ScoreBands {
            weak_below: 70.0,
            strong_from: 85.0,
        }
    }

    /// Maps an average score onto a level, or `None` under the manual policy.
    #[must_use]
    pub fn classify(&self, score: f64) -> Option<PerformanceLevel> {
        match *self {
            Self::Manual => None,
            Self::ScoreBands {
                weak_below,
                strong_from,
            } => Some(if score < weak_below {
                PerformanceLevel::Weak
            } else if score >= strong_from {
                PerformanceLevel::Strong
            } else {
                PerformanceLevel::Medium
            }),
        }
    }
}

/// Constructor-time engine parameters, immutable for the lifetime of a learner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Learning rate alpha, in (0, 1].
    pub learning_rate: f64,
    /// Discount factor gamma, in (0, 1].
    pub discount: f64,
    /// Exploration probability epsilon, in [0, 1].
    pub exploration: f64,
    /// Lower bound for an adjusted subject allocation.
    pub min_hours: f64,
    /// Upper bound for an adjusted subject allocation.
    pub max_hours: f64,
    /// Hours added or removed by a non-`Same` action.
    pub step_size: f64,
    /// Credit assignment for completion feedback.
    pub credit_assignment: CreditAssignment,
    /// Level update policy.
    pub level_policy: LevelPolicy,
    /// Seed for the runtime-owned random source. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            discount: 0.9,
            exploration: 0.2,
            min_hours: 0.5,
            max_hours: 4.0,
            step_size: 0.5,
            credit_assignment: CreditAssignment::Same,
            level_policy: LevelPolicy::Manual,
            seed: None,
        }
    }
}

impl EngineConfig {
    /// Defaults with exploration disabled.
    #[must_use]
    pub fn greedy() -> Self {
        Self {
            exploration: 0.0,
            ..Self::default()
        }
    }

    /// Checks every parameter, failing on the first invalid one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("learning_rate", "(0, 1]", self.learning_rate, false)?;
        check_rate("discount", "(0, 1]", self.discount, false)?;
        check_rate("exploration", "[0, 1]", self.exploration, true)?;
        check_hours("min_hours", self.min_hours)?;
        check_hours("max_hours", self.max_hours)?;
        check_hours("step_size", self.step_size)?;
        if self.min_hours > self.max_hours {
            return Err(ConfigError::InvertedBounds {
                min: self.min_hours,
                max: self.max_hours,
            });
        }
        if let LevelPolicy::ScoreBands {
            weak_below,
            strong_from,
        } = self.level_policy
        {
            if !weak_below.is_finite() || !strong_from.is_finite() || weak_below > strong_from {
                return Err(ConfigError::InvalidScoreBands {
                    weak_below,
                    strong_from,
                });
            }
        }
        Ok(())
    }
}

fn check_rate(
    name: &'static str,
    range: &'static str,
    value: f64,
    zero_allowed: bool,
) -> Result<(), ConfigError> {
    let lower_ok = if zero_allowed { value >= 0.0 } else { value > 0.0 };
    if lower_ok && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::RateOutOfRange { name, range, value })
    }
}

fn check_hours(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidHours { name, value })
    }
}

const fn default_weak_below() -> f64 {
    70.0
}

const fn default_strong_from() -> f64 {
    85.0
}

use std::{collections::BTreeMap, fmt, str::FromStr};

use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::levels::PerformanceLevel;

/// Discrete adjustment applied to a subject's base hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Remove one step.
    #[serde(alias = "dec")]
    Decrease,
    /// Keep the base hours.
    Same,
    /// Add one step.
    #[serde(alias = "inc")]
    Increase,
}

impl Action {
    /// The closed action set, in table order.
    pub const ALL: [Self; 3] = [Self::Decrease, Self::Same, Self::Increase];

    /// Deterministic preference used when ties are not broken randomly.
    const TIE_ORDER: [Self; 3] = [Self::Same, Self::Decrease, Self::Increase];

    /// Lowercase label used on disk and in audit rows.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Decrease => "decrease",
            Self::Same => "same",
            Self::Increase => "increase",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Decrease => 0,
            Self::Same => 1,
            Self::Increase => 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "decrease" | "dec" => Ok(Self::Decrease),
            "same" => Ok(Self::Same),
            "increase" | "inc" => Ok(Self::Increase),
            other => Err(format!("unknown action `{other}`")),
        }
    }
}

/// Structural key of one value-table cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ValueKey {
    /// Subject identifier.
    pub subject: String,
    /// Performance level of the subject.
    pub level: PerformanceLevel,
    /// Adjustment action.
    pub action: Action,
}

impl ValueKey {
    /// Builds a key.
    #[must_use]
    pub fn new(subject: impl Into<String>, level: PerformanceLevel, action: Action) -> Self {
        Self {
            subject: subject.into(),
            level,
            action,
        }
    }
}

/// Sparse (subject, level, action) → estimate mapping.
///
/// Rows are keyed by (subject, level) and always hold one value per action, so a
/// row that was touched once carries explicit zeros for the other actions. Reading
/// an untouched cell returns `0.0` without creating it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    rows: BTreeMap<(String, PerformanceLevel), [f64; 3]>,
}

impl ValueTable {
    /// Value returned for cells that were never written.
    pub const DEFAULT_VALUE: f64 = 0.0;

    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn row(&self, subject: &str, level: PerformanceLevel) -> [f64; 3] {
        self.rows
            .get(&(subject.to_owned(), level))
            .copied()
            .unwrap_or([Self::DEFAULT_VALUE; 3])
    }

    /// Current estimate, `0.0` for unseen keys.
    #[must_use]
    pub fn read(&self, subject: &str, level: PerformanceLevel, action: Action) -> f64 {
        self.row(subject, level)[action.index()]
    }

    /// Upserts one estimate, materializing the rest of its row as zeros.
    pub fn write(
        &mut self,
        subject: impl Into<String>,
        level: PerformanceLevel,
        action: Action,
        value: f64,
    ) {
        let row = self
            .rows
            .entry((subject.into(), level))
            .or_insert([Self::DEFAULT_VALUE; 3]);
        row[action.index()] = value;
    }

    /// Largest estimate over all actions for (subject, level).
    #[must_use]
    pub fn max_value(&self, subject: &str, level: PerformanceLevel) -> f64 {
        self.row(subject, level)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Every action whose estimate equals the row maximum, in table order.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn best_actions(&self, subject: &str, level: PerformanceLevel) -> Vec<Action> {
        let row = self.row(subject, level);
        let max = self.max_value(subject, level);
        Action::ALL
            .into_iter()
            .filter(|action| row[action.index()] == max)
            .collect()
    }

    /// Best action with ties broken uniformly at random through `rng`.
    pub fn best_action<R: Rng + ?Sized>(
        &self,
        subject: &str,
        level: PerformanceLevel,
        rng: &mut R,
    ) -> Action {
        let tied = self.best_actions(subject, level);
        tied.choose(rng).copied().unwrap_or(Action::Same)
    }

    /// Best action with ties resolved deterministically: `Same`, then `Decrease`, then `Increase`.
    #[must_use]
    pub fn greedy_action(&self, subject: &str, level: PerformanceLevel) -> Action {
        let tied = self.best_actions(subject, level);
        Action::TIE_ORDER
            .into_iter()
            .find(|action| tied.contains(action))
            .unwrap_or(Action::Same)
    }

    /// All stored cells ordered by subject, level, then action.
    #[must_use]
    pub fn entries(&self) -> Vec<(ValueKey, f64)> {
        self.rows
            .iter()
            .flat_map(|((subject, level), row)| {
                Action::ALL.into_iter().map(move |action| {
                    (ValueKey::new(subject.clone(), *level, action), row[action.index()])
                })
            })
            .collect()
    }

    /// Number of stored cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len() * Action::ALL.len()
    }

    /// Whether nothing was ever written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

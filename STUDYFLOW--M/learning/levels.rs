use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Coarse tri-state proxy for how a subject is going.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum PerformanceLevel {
    /// Struggling.
    Weak,
    /// Default for subjects with no recorded level.
    #[default]
    Medium,
    /// Doing well.
    Strong,
}

impl PerformanceLevel {
    /// All levels, weakest first.
    pub const ALL: [Self; 3] = [Self::Weak, Self::Medium, Self::Strong];

    /// Integer code stored on disk and in audit rows.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Weak => 0,
            Self::Medium => 1,
            Self::Strong => 2,
        }
    }

    /// Maps any integer onto a level, clamping into `0..=2`.
    #[must_use]
    pub const fn from_clamped(raw: i64) -> Self {
        if raw <= 0 {
            Self::Weak
        } else if raw == 1 {
            Self::Medium
        } else {
            Self::Strong
        }
    }
}

impl From<PerformanceLevel> for u8 {
    fn from(level: PerformanceLevel) -> Self {
        level.code()
    }
}

impl TryFrom<u8> for PerformanceLevel {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Weak),
            1 => Ok(Self::Medium),
            2 => Ok(Self::Strong),
            other => Err(format!("performance level {other} is not one of 0, 1, 2")),
        }
    }
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
        })
    }
}

/// Per-subject performance levels. Subjects are matched exactly (case-sensitive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectStateStore {
    levels: BTreeMap<String, PerformanceLevel>,
}

impl SubjectStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored level for `subject`, or `Medium` when none was ever set.
    #[must_use]
    pub fn get_level(&self, subject: &str) -> PerformanceLevel {
        self.levels.get(subject).copied().unwrap_or_default()
    }

    /// Overwrites the level for `subject`, returning the previous stored value.
    pub fn set_level(
        &mut self,
        subject: impl Into<String>,
        level: PerformanceLevel,
    ) -> Option<PerformanceLevel> {
        self.levels.insert(subject.into(), level)
    }

    /// Explicitly stored levels, ordered by subject.
    pub fn iter(&self) -> impl Iterator<Item = (&str, PerformanceLevel)> + '_ {
        self.levels.iter().map(|(subject, level)| (subject.as_str(), *level))
    }

    /// Number of subjects with an explicit level.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether no level was ever set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl FromIterator<(String, PerformanceLevel)> for SubjectStateStore {
    fn from_iter<T: IntoIterator<Item = (String, PerformanceLevel)>>(iter: T) -> Self {
        Self {
            levels: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_subjects_default_to_medium() {
        let store = SubjectStateStore::new();
        assert_eq!(store.get_level("Math"), PerformanceLevel::Medium);
        assert!(store.is_empty());
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let mut store = SubjectStateStore::new();
        store.set_level("Math", PerformanceLevel::Weak);
        assert_eq!(store.get_level("Math"), PerformanceLevel::Weak);
        assert_eq!(store.get_level("math"), PerformanceLevel::Medium);
    }

    #[test]
    fn set_level_overwrites() {
        let mut store = SubjectStateStore::new();
        assert_eq!(store.set_level("CS", PerformanceLevel::Strong), None);
        assert_eq!(
            store.set_level("CS", PerformanceLevel::Weak),
            Some(PerformanceLevel::Strong)
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn raw_levels_are_clamped() {
        assert_eq!(PerformanceLevel::from_clamped(-4), PerformanceLevel::Weak);
        assert_eq!(PerformanceLevel::from_clamped(1), PerformanceLevel::Medium);
        assert_eq!(PerformanceLevel::from_clamped(9), PerformanceLevel::Strong);
    }

    #[test]
    fn codes_reject_out_of_range() {
        assert_eq!(PerformanceLevel::try_from(2), Ok(PerformanceLevel::Strong));
        assert!(PerformanceLevel::try_from(3).is_err());
        assert_eq!(serde_json::to_string(&PerformanceLevel::Weak).unwrap(), "0");
        assert!(serde_json::from_str::<PerformanceLevel>("7").is_err());
    }
}

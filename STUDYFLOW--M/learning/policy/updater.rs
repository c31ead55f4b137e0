use crate::{
    levels::PerformanceLevel,
    value_table::{Action, ValueTable},
};

/// One-step temporal-difference (Q-learning) update rule.
///
/// `Q(s,a) <- Q(s,a) + alpha * (reward + gamma * max_a' Q(s',a') - Q(s,a))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueUpdater {
    alpha: f64,
    gamma: f64,
}

impl ValueUpdater {
    /// Creates an updater. Rates are expected to be validated already.
    #[must_use]
    pub const fn new(alpha: f64, gamma: f64) -> Self {
        Self { alpha, gamma }
    }

    /// Learning rate.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Discount factor.
    #[must_use]
    pub const fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Applies the rule in memory and returns the new estimate.
    ///
    /// A missing `next_level` bootstraps off the current level.
    pub fn update(
        &self,
        table: &mut ValueTable,
        subject: &str,
        level: PerformanceLevel,
        action: Action,
        reward: f64,
        next_level: Option<PerformanceLevel>,
    ) -> f64 {
        let next_level = next_level.unwrap_or(level);
        let old = table.read(subject, level, action);
        let best_future = table.max_value(subject, next_level);
        let new = self
            .alpha
            .mul_add(reward + self.gamma * best_future - old, old);
        table.write(subject, level, action, new);
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_hand_computed_values() {
        let mut table = ValueTable::new();
        let updater = ValueUpdater::new(0.3, 0.9);
        let first = updater.update(
            &mut table,
            "Math",
            PerformanceLevel::Medium,
            Action::Same,
            1.0,
            None,
        );
        assert!((first - 0.3).abs() < 1e-9);
        let second = updater.update(
            &mut table,
            "Math",
            PerformanceLevel::Medium,
            Action::Same,
            1.0,
            Some(PerformanceLevel::Medium),
        );
        assert!((second - 0.591).abs() < 1e-9);
        assert!((table.read("Math", PerformanceLevel::Medium, Action::Same) - 0.591).abs() < 1e-9);
    }

    #[test]
    fn bootstraps_off_the_next_level() {
        let mut table = ValueTable::new();
        table.write("CS", PerformanceLevel::Strong, Action::Increase, 2.0);
        let updater = ValueUpdater::new(0.5, 0.5);
        let value = updater.update(
            &mut table,
            "CS",
            PerformanceLevel::Weak,
            Action::Decrease,
            0.0,
            Some(PerformanceLevel::Strong),
        );
        assert!((value - 0.5).abs() < 1e-9);
    }

    #[test]
    fn negative_reward_pulls_value_down() {
        let mut table = ValueTable::new();
        let updater = ValueUpdater::new(0.3, 0.9);
        let value = updater.update(
            &mut table,
            "CS",
            PerformanceLevel::Medium,
            Action::Same,
            -1.0,
            None,
        );
        assert!((value + 0.3).abs() < 1e-9);
        assert_eq!(table.greedy_action("CS", PerformanceLevel::Medium), Action::Decrease);
    }
}

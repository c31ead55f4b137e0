use rand::{seq::SliceRandom, Rng};

use crate::{
    levels::PerformanceLevel,
    value_table::{Action, ValueTable},
};

/// Epsilon-greedy selector over a [`ValueTable`].
///
/// Randomness always comes from the caller's source. With `epsilon == 0` the
/// selector never touches it: ties resolve through [`ValueTable::greedy_action`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionSelector {
    epsilon: f64,
}

impl ActionSelector {
    /// Creates a selector. `epsilon` is expected to be validated already.
    #[must_use]
    pub const fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Exploration probability.
    #[must_use]
    pub const fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Whether exploration (and random tie-breaking) is switched off.
    #[must_use]
    pub fn is_greedy(&self) -> bool {
        self.epsilon <= 0.0
    }

    /// Picks an action for (subject, level).
    pub fn select<R: Rng + ?Sized>(
        &self,
        table: &ValueTable,
        subject: &str,
        level: PerformanceLevel,
        rng: &mut R,
    ) -> Action {
        if self.is_greedy() {
            return table.greedy_action(subject, level);
        }
        if rng.gen::<f64>() < self.epsilon {
            return Action::ALL.choose(rng).copied().unwrap_or(Action::Same);
        }
        table.best_action(subject, level, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{
        rngs::{mock::StepRng, SmallRng},
        SeedableRng,
    };
    use std::collections::HashSet;

    fn table_with_unique_max() -> ValueTable {
        let mut table = ValueTable::new();
        table.write("Math", PerformanceLevel::Weak, Action::Increase, 0.8);
        table.write("Math", PerformanceLevel::Weak, Action::Same, 0.1);
        table
    }

    #[test]
    fn greedy_selection_is_deterministic() {
        let table = table_with_unique_max();
        let selector = ActionSelector::new(0.0);
        let mut first = SmallRng::seed_from_u64(1);
        let mut second = SmallRng::seed_from_u64(999);
        for _ in 0..50 {
            assert_eq!(
                selector.select(&table, "Math", PerformanceLevel::Weak, &mut first),
                Action::Increase
            );
            assert_eq!(
                selector.select(&table, "Math", PerformanceLevel::Weak, &mut second),
                Action::Increase
            );
        }
    }

    #[test]
    fn greedy_fresh_table_keeps_hours() {
        let selector = ActionSelector::new(0.0);
        let mut rng = SmallRng::seed_from_u64(3);
        assert_eq!(
            selector.select(&ValueTable::new(), "CS", PerformanceLevel::Medium, &mut rng),
            Action::Same
        );
    }

    #[test]
    fn full_exploration_visits_every_action() {
        let table = table_with_unique_max();
        let selector = ActionSelector::new(1.0);
        let mut rng = SmallRng::seed_from_u64(42);
        let seen: HashSet<Action> = (0..300)
            .map(|_| selector.select(&table, "Math", PerformanceLevel::Weak, &mut rng))
            .collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn same_seed_replays_the_same_choices() {
        let table = table_with_unique_max();
        let selector = ActionSelector::new(0.5);
        let run = |seed| {
            let mut rng = SmallRng::seed_from_u64(seed);
            (0..64)
                .map(|_| selector.select(&table, "Math", PerformanceLevel::Weak, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn exploits_when_the_draw_beats_epsilon() {
        let table = table_with_unique_max();
        let selector = ActionSelector::new(0.5);
        // A saturated counter draws just under 1.0 on every call.
        let mut rng = StepRng::new(u64::MAX, 0);
        for _ in 0..10 {
            assert_eq!(
                selector.select(&table, "Math", PerformanceLevel::Weak, &mut rng),
                Action::Increase
            );
        }
    }
}

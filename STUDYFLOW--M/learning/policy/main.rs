//! Policy half of the learner: how actions are chosen and how estimates move.

/// Epsilon-greedy action selection.
pub mod selector;
/// Temporal-difference value updates.
pub mod updater;

pub use selector::ActionSelector;
pub use updater::ValueUpdater;

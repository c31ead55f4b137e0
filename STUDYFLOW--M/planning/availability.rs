use std::fmt;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::helper::round_hours;

/// Study time always left in a day, however booked it is.
pub const MIN_STUDY_HOURS: f64 = 2.0;

/// `total_wake_hours - class_hours - buffer_hours`, floored at [`MIN_STUDY_HOURS`]
/// and rounded to two decimals.
#[must_use]
pub fn estimate_available(total_wake_hours: f64, class_hours: f64, buffer_hours: f64) -> f64 {
    let available = total_wake_hours - class_hours - buffer_hours;
    round_hours(available.max(MIN_STUDY_HOURS))
}

/// Computes how many hours are left for study today.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailabilityEstimator {
    buffer_hours: f64,
}

impl AvailabilityEstimator {
    /// Creates an estimator reserving `buffer_hours` for meals, travel, and rest.
    #[must_use]
    pub const fn new(buffer_hours: f64) -> Self {
        Self { buffer_hours }
    }

    /// Configured buffer.
    #[must_use]
    pub const fn buffer_hours(&self) -> f64 {
        self.buffer_hours
    }

    /// Available study hours given the wake budget and today's class time.
    #[must_use]
    pub fn estimate(&self, total_wake_hours: f64, class_hours: f64) -> f64 {
        estimate_available(total_wake_hours, class_hours, self.buffer_hours)
    }
}

impl Default for AvailabilityEstimator {
    fn default() -> Self {
        Self::new(3.0)
    }
}

/// One timetable slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    /// Slot start.
    pub start: NaiveTime,
    /// Slot end.
    pub end: NaiveTime,
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Fixed-length class slots laid out from the start of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotClock {
    day_start: NaiveTime,
    slot_minutes: u32,
}

impl SlotClock {
    /// Creates a clock.
    #[must_use]
    pub const fn new(day_start: NaiveTime, slot_minutes: u32) -> Self {
        Self {
            day_start,
            slot_minutes,
        }
    }

    /// Minutes per slot.
    #[must_use]
    pub const fn slot_minutes(&self) -> u32 {
        self.slot_minutes
    }

    /// Class time in hours for `slot_count` slots.
    #[must_use]
    pub fn class_hours(&self, slot_count: u32) -> f64 {
        f64::from(slot_count) * f64::from(self.slot_minutes) / 60.0
    }

    /// The first `count` consecutive slots of the day.
    #[must_use]
    pub fn slots_for_day(&self, count: u32) -> Vec<TimeSlot> {
        let step = Duration::minutes(i64::from(self.slot_minutes));
        let mut current = self.day_start;
        (0..count)
            .map(|_| {
                let end = current + step;
                let slot = TimeSlot {
                    start: current,
                    end,
                };
                current = end;
                slot
            })
            .collect()
    }
}

impl Default for SlotClock {
    fn default() -> Self {
        Self::new(default_day_start(), 50)
    }
}

/// 08:00.
#[must_use]
pub fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

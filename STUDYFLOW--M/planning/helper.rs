/// Rounds an hour figure to two decimals.
#[must_use]
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Renders hours as `1h 30m`, `2h`, or `45m`.
#[must_use]
pub fn format_hours(hours: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let minutes = (hours.max(0.0) * 60.0).round() as u64;
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents_of_an_hour() {
        assert!((round_hours(9.666_666) - 9.67).abs() < 1e-9);
        assert!((round_hours(2.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_hours(1.5), "1h 30m");
        assert_eq!(format_hours(2.0), "2h");
        assert_eq!(format_hours(0.75), "45m");
        assert_eq!(format_hours(4.84), "4h 50m");
        assert_eq!(format_hours(0.0), "0m");
    }
}

//! Moon phase descriptor for a session date
//!
//! Good to a day or so, which is all the log needs. Phase age is measured
//! from the new moon of 2000-01-06 18:14 UTC against the mean synodic month.

use chrono::NaiveDate;

/// Mean synodic month in days.
const SYNODIC_MONTH: f64 = 29.530_588_53;

/// Fractional day offset of the epoch new moon (18:14 UTC).
const EPOCH_OFFSET: f64 = 0.7597;

pub const PHASES: [&str; 8] = [
    "New Moon",
    "Waxing Crescent",
    "First Quarter",
    "Waxing Gibbous",
    "Full Moon",
    "Waning Gibbous",
    "Last Quarter",
    "Waning Crescent",
];

/// Descriptor for the phase on a given date.
pub fn phase_for_date(date: NaiveDate) -> &'static str {
    let epoch = NaiveDate::from_ymd_opt(2000, 1, 6).unwrap();
    let days = (date - epoch).num_days() as f64 - EPOCH_OFFSET;
    let age = days.rem_euclid(SYNODIC_MONTH);
    // Eight principal phases, each covering 1/8 of the cycle centred on the
    // phase instant.
    let slot = ((age / SYNODIC_MONTH) * 8.0 + 0.5).floor() as usize % 8;
    PHASES[slot]
}

/// Descriptor for an ISO date string; empty when unparseable.
pub fn phase_for_iso_date(date: &str) -> String {
    let day = date.get(..10).unwrap_or(date);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(d) => phase_for_date(d).to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_full_moon() {
        // 2025-01-13 was a full moon.
        let d = NaiveDate::from_ymd_opt(2025, 1, 13).unwrap();
        assert_eq!(phase_for_date(d), "Full Moon");
    }

    #[test]
    fn known_new_moon() {
        // 2025-01-29 was a new moon.
        let d = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        assert_eq!(phase_for_date(d), "New Moon");
    }

    #[test]
    fn bad_date_yields_empty_descriptor() {
        assert_eq!(phase_for_iso_date("not-a-date"), "");
    }

    #[test]
    fn datetime_strings_are_truncated_to_the_day() {
        let a = phase_for_iso_date("2025-01-13");
        let b = phase_for_iso_date("2025-01-13T22:10:00Z");
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }
}

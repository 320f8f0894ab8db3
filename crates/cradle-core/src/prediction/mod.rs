//! Care-event predictors.
//!
//! Predictors are pure: they read a snapshot of events and return an
//! ephemeral prediction, or `None` when the input does not support one.

mod feeding;
mod sleep;

pub use feeding::{
    average_interval_minutes, predict_next_feeding, FeedingIntervalPredictor, FeedingModel,
    FeedingPrediction,
};
pub use sleep::{SleepWindowPrediction, SleepWindowPredictor, WakeWindowPredictor};

use chrono::{DateTime, Datelike, NaiveDate};

/// Parse a birth date given as `YYYY-MM-DD` or as a full RFC 3339 timestamp.
pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|t| t.date_naive()))
}

/// Whole calendar months from `birth` to `today`.
///
/// A month only counts once its day-of-month has been reached. Dates
/// before birth count as zero.
pub fn age_in_months(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut months = (today.year() - birth.year()) * 12 + today.month() as i32
        - birth.month() as i32;
    if today.day() < birth.day() {
        months -= 1;
    }
    months.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn birth_date_formats() {
        assert_eq!(parse_birth_date("2026-01-15"), Some(d(2026, 1, 15)));
        assert_eq!(
            parse_birth_date("2026-01-15T10:30:00Z"),
            Some(d(2026, 1, 15))
        );
        assert_eq!(parse_birth_date(""), None);
        assert_eq!(parse_birth_date("15/01/2026"), None);
    }

    #[test]
    fn months_truncate_before_day_of_month() {
        assert_eq!(age_in_months(d(2026, 1, 15), d(2026, 4, 14)), 2);
        assert_eq!(age_in_months(d(2026, 1, 15), d(2026, 4, 15)), 3);
        assert_eq!(age_in_months(d(2025, 11, 30), d(2026, 1, 29)), 1);
        assert_eq!(age_in_months(d(2025, 6, 1), d(2026, 6, 1)), 12);
    }

    #[test]
    fn future_birth_counts_as_newborn() {
        assert_eq!(age_in_months(d(2026, 5, 1), d(2026, 4, 1)), 0);
    }
}

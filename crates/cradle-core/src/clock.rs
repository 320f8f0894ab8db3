//! Wall-clock helpers.
//!
//! Converts between "HH:MM" strings and minute offsets from midnight, and
//! derives night windows whose end may fall on the following calendar day
//! (e.g. 22:00 to 06:00).
//!
//! All instants are evaluated in UTC. Callers that track a device zone
//! normalize timestamps before they reach the engine.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse an "HH:MM" string into minutes since midnight.
///
/// Returns `None` for malformed input, hours above 23 or minutes above 59.
pub fn parse_clock_time(value: &str) -> Option<u32> {
    let (hours, minutes) = value.trim().split_once(':')?;
    if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
        return None;
    }
    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Format minutes since midnight as "HH:MM". Values past a day wrap around.
pub fn format_clock_time(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Minutes since midnight of `t`.
pub fn minutes_of_day(t: DateTime<Utc>) -> u32 {
    t.hour() * 60 + t.minute()
}

/// The instant `minutes` after midnight of `date`. Offsets of a day or more
/// roll into the following days.
pub fn at_minutes(date: NaiveDate, minutes: u32) -> DateTime<Utc> {
    date.and_time(NaiveTime::default()).and_utc() + Duration::minutes(minutes as i64)
}

/// Whether `minute` lies in `[start, end)` on a 24h dial.
///
/// When `end < start` the range wraps past midnight. An equal start and end
/// is an empty range.
pub fn is_within_clock_range(minute: u32, start: u32, end: u32) -> bool {
    let minute = minute % MINUTES_PER_DAY;
    if start <= end {
        start <= minute && minute < end
    } else {
        minute >= start || minute < end
    }
}

/// A concrete night window for one evening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl NightWindow {
    /// The window that begins on `date` at `start_min`.
    ///
    /// If `end_min` is earlier than `start_min` the window ends on the next day.
    pub fn for_day(date: NaiveDate, start_min: u32, end_min: u32) -> Self {
        let start = at_minutes(date, start_min % MINUTES_PER_DAY);
        let mut end = at_minutes(date, end_min % MINUTES_PER_DAY);
        if end < start {
            end += Duration::days(1);
        }
        Self { start, end }
    }

    /// Same as [`NightWindow::for_day`] but from "HH:MM" boundaries.
    pub fn parse_for_day(date: NaiveDate, start: &str, end: &str) -> Option<Self> {
        Some(Self::for_day(
            date,
            parse_clock_time(start)?,
            parse_clock_time(end)?,
        ))
    }

    /// The window containing `t`, if `t` falls inside one.
    ///
    /// For a wrapping window an early-morning `t` belongs to the window that
    /// started the previous evening.
    pub fn containing(t: DateTime<Utc>, start_min: u32, end_min: u32) -> Option<Self> {
        let minute = minutes_of_day(t);
        if !is_within_clock_range(minute, start_min, end_min) {
            return None;
        }
        let today = t.date_naive();
        let wraps = end_min < start_min;
        let opened_on = if wraps && minute < end_min {
            today.pred_opt()?
        } else {
            today
        };
        Some(Self::for_day(opened_on, start_min, end_min))
    }

    /// Start inclusive, end exclusive.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parse_clock_time_accepts_valid_values() {
        assert_eq!(parse_clock_time("00:00"), Some(0));
        assert_eq!(parse_clock_time("06:00"), Some(360));
        assert_eq!(parse_clock_time("22:00"), Some(1320));
        assert_eq!(parse_clock_time("9:05"), Some(545));
        assert_eq!(parse_clock_time("23:59"), Some(1439));
    }

    #[test]
    fn parse_clock_time_rejects_garbage() {
        assert_eq!(parse_clock_time("24:00"), None);
        assert_eq!(parse_clock_time("12:60"), None);
        assert_eq!(parse_clock_time("1200"), None);
        assert_eq!(parse_clock_time("ab:cd"), None);
        assert_eq!(parse_clock_time("12:5"), None);
        assert_eq!(parse_clock_time(""), None);
    }

    #[test]
    fn format_wraps_past_midnight() {
        assert_eq!(format_clock_time(360), "06:00");
        assert_eq!(format_clock_time(MINUTES_PER_DAY + 75), "01:15");
    }

    #[test]
    fn clock_range_handles_wrap() {
        // 22:00 - 06:00
        assert!(is_within_clock_range(1320, 1320, 360));
        assert!(is_within_clock_range(0, 1320, 360));
        assert!(is_within_clock_range(359, 1320, 360));
        assert!(!is_within_clock_range(360, 1320, 360));
        assert!(!is_within_clock_range(1319, 1320, 360));
        // 13:00 - 15:00
        assert!(is_within_clock_range(800, 780, 900));
        assert!(!is_within_clock_range(900, 780, 900));
        // empty
        assert!(!is_within_clock_range(780, 780, 780));
    }

    #[test]
    fn night_window_for_day_wraps_to_next_day() {
        let w = NightWindow::parse_for_day(date(2026, 3, 1), "22:00", "06:00").unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap());
        assert_eq!(w.duration_minutes(), 8 * 60);
    }

    #[test]
    fn night_window_same_day_range() {
        let w = NightWindow::parse_for_day(date(2026, 3, 1), "13:00", "15:30").unwrap();
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 3, 1, 15, 30, 0).unwrap());
    }

    #[test]
    fn containing_early_morning_belongs_to_previous_evening() {
        let t = Utc.with_ymd_and_hms(2026, 3, 2, 3, 30, 0).unwrap();
        let w = NightWindow::containing(t, 1320, 360).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2026, 3, 1, 22, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2026, 3, 2, 6, 0, 0).unwrap());
    }

    #[test]
    fn containing_late_evening_ends_next_morning() {
        let t = Utc.with_ymd_and_hms(2026, 12, 31, 23, 10, 0).unwrap();
        let w = NightWindow::containing(t, 1320, 360).unwrap();
        assert_eq!(w.end, Utc.with_ymd_and_hms(2027, 1, 1, 6, 0, 0).unwrap());
    }

    #[test]
    fn containing_returns_none_outside_window() {
        let t = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        assert!(NightWindow::containing(t, 1320, 360).is_none());
    }

    proptest! {
        #[test]
        fn containing_window_always_contains_instant(
            secs in 1_700_000_000i64..1_900_000_000i64,
            start in 0u32..MINUTES_PER_DAY,
            end in 0u32..MINUTES_PER_DAY,
        ) {
            let t = Utc.timestamp_opt(secs, 0).unwrap();
            if let Some(w) = NightWindow::containing(t, start, end) {
                prop_assert!(w.contains(t));
                prop_assert_eq!(minutes_of_day(w.end), end);
            }
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{age_in_months, parse_birth_date};
use crate::events::{CareEvent, CareEventKind};
use crate::stale::MAX_OPEN_SLEEP_HOURS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepWindowPrediction {
    pub recommended_start: DateTime<Utc>,
    /// 0.0 - 1.0
    pub confidence: f64,
}

/// Anything that can suggest when the next sleep should begin.
pub trait SleepWindowPredictor: Send + Sync {
    fn predict(
        &self,
        birth_date: &str,
        events: &[CareEvent],
        now: DateTime<Utc>,
    ) -> Option<SleepWindowPrediction>;
}

/// Age-banded wake windows measured from the end of the last sleep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeWindowPredictor {
    /// `(age in months upper bound, wake window minutes)`, ascending.
    pub wake_windows: Vec<(i32, i64)>,
    pub default_wake_minutes: i64,
    pub base_confidence: f64,
    pub confidence_per_sleep: f64,
    pub max_confidence: f64,
}

impl Default for WakeWindowPredictor {
    fn default() -> Self {
        Self {
            wake_windows: vec![(1, 45), (3, 75), (6, 105), (9, 150), (12, 180)],
            default_wake_minutes: 240,
            base_confidence: 0.3,
            confidence_per_sleep: 0.05,
            max_confidence: 0.85,
        }
    }
}

impl WakeWindowPredictor {
    pub fn wake_window_minutes(&self, age_months: i32) -> i64 {
        self.wake_windows
            .iter()
            .find(|(upper, _)| age_months < *upper)
            .map(|(_, minutes)| *minutes)
            .unwrap_or(self.default_wake_minutes)
    }
}

impl SleepWindowPredictor for WakeWindowPredictor {
    /// `None` while the baby is asleep (an open sleep younger than the stale
    /// ceiling), without any completed sleep, or for an invalid birth date.
    fn predict(
        &self,
        birth_date: &str,
        events: &[CareEvent],
        now: DateTime<Utc>,
    ) -> Option<SleepWindowPrediction> {
        let birth = parse_birth_date(birth_date)?;
        let sleeps: Vec<&CareEvent> = events
            .iter()
            .filter(|e| e.kind() == CareEventKind::Sleep)
            .collect();

        let ceiling = Duration::hours(MAX_OPEN_SLEEP_HOURS);
        let asleep = sleeps
            .iter()
            .any(|s| s.is_open() && now - s.start() <= ceiling);
        if asleep {
            return None;
        }

        let completed: Vec<DateTime<Utc>> = sleeps.iter().filter_map(|s| s.end()).collect();
        let last_wake = completed.iter().max()?;

        let age = age_in_months(birth, now.date_naive());
        let confidence = (self.base_confidence
            + self.confidence_per_sleep * completed.len() as f64)
            .min(self.max_confidence);

        Some(SleepWindowPrediction {
            recommended_start: *last_wake + Duration::minutes(self.wake_window_minutes(age)),
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 20, 14, 0, 0).unwrap()
    }

    #[test]
    fn open_sleep_means_no_window() {
        let events = vec![CareEvent::sleep("s", now() - Duration::minutes(40), None)];
        assert!(WakeWindowPredictor::default()
            .predict("2026-03-01", &events, now())
            .is_none());
    }

    #[test]
    fn abandoned_open_sleep_does_not_block_prediction() {
        let t = now();
        let events = vec![
            CareEvent::sleep("old", t - Duration::hours(30), None),
            CareEvent::sleep("nap", t - Duration::hours(2), Some(t - Duration::hours(1))),
        ];
        let p = WakeWindowPredictor::default()
            .predict("2026-03-01", &events, t)
            .unwrap();
        // 2 months old -> 75 minute wake window
        assert_eq!(p.recommended_start, t - Duration::hours(1) + Duration::minutes(75));
    }

    #[test]
    fn confidence_grows_with_history() {
        let t = now();
        let events: Vec<CareEvent> = (0..20)
            .map(|i| {
                let start = t - Duration::hours(3 * (i + 1));
                CareEvent::sleep(format!("s{i}"), start, Some(start + Duration::hours(1)))
            })
            .collect();
        let p = WakeWindowPredictor::default()
            .predict("2025-01-01", &events, t)
            .unwrap();
        assert_eq!(p.confidence, 0.85);

        let p = WakeWindowPredictor::default()
            .predict("2025-01-01", &events[..2], t)
            .unwrap();
        assert!((p.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn no_completed_sleep_means_no_window() {
        let events = vec![CareEvent::feeding("f", now())];
        assert!(WakeWindowPredictor::default()
            .predict("2026-03-01", &events, now())
            .is_none());
    }
}

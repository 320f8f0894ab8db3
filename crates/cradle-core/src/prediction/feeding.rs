//! Next-feeding estimation.
//!
//! Blends an age-banded baseline interval with the baby's own recent
//! cadence. Overnight stretches are excluded from the cadence because they
//! describe sleep, not hunger.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{age_in_months, parse_birth_date};
use crate::clock::NightWindow;
use crate::events::{feedings_sorted, CareEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingPrediction {
    pub next_feeding_time: DateTime<Utc>,
    /// Blended interval, rounded to whole minutes.
    pub interval_minutes: i64,
    pub is_personalized: bool,
    /// 0.0 - 1.0
    pub confidence: f64,
}

/// Tunable constants for the feeding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingModel {
    /// `(age in months upper bound, interval minutes)`, ascending.
    pub age_bands: Vec<(i32, i64)>,
    /// Interval once the baby has outgrown every band.
    pub default_interval_minutes: i64,
    pub min_events_for_personalization: usize,
    /// Gaps longer than this are treated as overnight breaks.
    pub max_cadence_gap_minutes: i64,
    pub personal_weight: f64,
    pub base_confidence: f64,
    pub confidence_per_event: f64,
    pub max_confidence: f64,
    pub fallback_confidence: f64,
    /// Night suppression applies from this age on.
    pub night_suppression_min_age_months: i32,
    pub night_start_minutes: u32,
    pub night_end_minutes: u32,
}

impl Default for FeedingModel {
    fn default() -> Self {
        Self {
            age_bands: vec![(3, 150), (6, 210), (12, 270)],
            default_interval_minutes: 300,
            min_events_for_personalization: 5,
            max_cadence_gap_minutes: 8 * 60,
            personal_weight: 0.7,
            base_confidence: 0.5,
            confidence_per_event: 0.03,
            max_confidence: 0.9,
            fallback_confidence: 0.4,
            night_suppression_min_age_months: 6,
            night_start_minutes: 22 * 60,
            night_end_minutes: 6 * 60,
        }
    }
}

impl FeedingModel {
    pub fn baseline_interval_minutes(&self, age_months: i32) -> i64 {
        self.age_bands
            .iter()
            .find(|(upper, _)| age_months < *upper)
            .map(|(_, minutes)| *minutes)
            .unwrap_or(self.default_interval_minutes)
    }
}

/// Average gap between consecutive feedings, ignoring gaps longer than
/// `max_gap_minutes`. `None` when no gap qualifies.
pub fn average_interval_minutes(feedings: &[&CareEvent], max_gap_minutes: i64) -> Option<f64> {
    let gaps: Vec<i64> = feedings
        .windows(2)
        .map(|pair| (pair[1].start() - pair[0].start()).num_minutes())
        .filter(|gap| *gap <= max_gap_minutes)
        .collect();
    if gaps.is_empty() {
        return None;
    }
    Some(gaps.iter().sum::<i64>() as f64 / gaps.len() as f64)
}

#[derive(Debug, Clone, Default)]
pub struct FeedingIntervalPredictor {
    model: FeedingModel,
}

impl FeedingIntervalPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: FeedingModel) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &FeedingModel {
        &self.model
    }

    /// Predict the next feeding from the wall clock.
    pub fn predict_now(&self, birth_date: &str, events: &[CareEvent]) -> Option<FeedingPrediction> {
        self.predict(birth_date, events, Utc::now())
    }

    /// Predict the next feeding.
    ///
    /// Returns `None` for an invalid birth date, no feedings, or a result that
    /// is not strictly after `now`. Non-feeding events are ignored.
    pub fn predict(
        &self,
        birth_date: &str,
        events: &[CareEvent],
        now: DateTime<Utc>,
    ) -> Option<FeedingPrediction> {
        let birth = parse_birth_date(birth_date)?;
        self.predict_from_birth(birth, events, now)
    }

    pub fn predict_from_birth(
        &self,
        birth: NaiveDate,
        events: &[CareEvent],
        now: DateTime<Utc>,
    ) -> Option<FeedingPrediction> {
        let feedings = feedings_sorted(events);
        let last = feedings.last()?.start();

        let age_months = age_in_months(birth, now.date_naive());
        let baseline = self.model.baseline_interval_minutes(age_months);

        let personal = if feedings.len() >= self.model.min_events_for_personalization {
            average_interval_minutes(&feedings, self.model.max_cadence_gap_minutes)
        } else {
            None
        };

        let (interval, is_personalized, confidence) = match personal {
            Some(avg) => {
                let blended = self.model.personal_weight * avg
                    + (1.0 - self.model.personal_weight) * baseline as f64;
                let confidence = (self.model.base_confidence
                    + self.model.confidence_per_event * feedings.len() as f64)
                    .min(self.model.max_confidence);
                (blended.round() as i64, true, confidence)
            }
            None => (baseline, false, self.model.fallback_confidence),
        };

        let mut next = last + Duration::minutes(interval);
        if age_months >= self.model.night_suppression_min_age_months {
            if let Some(night) = NightWindow::containing(
                next,
                self.model.night_start_minutes,
                self.model.night_end_minutes,
            ) {
                next = night.end;
            }
        }

        if next <= now {
            return None;
        }

        Some(FeedingPrediction {
            next_feeding_time: next,
            interval_minutes: interval,
            is_personalized,
            confidence,
        })
    }
}

/// Convenience wrapper around the default model.
pub fn predict_next_feeding(
    birth_date: &str,
    events: &[CareEvent],
    now: DateTime<Utc>,
) -> Option<FeedingPrediction> {
    FeedingIntervalPredictor::new().predict(birth_date, events, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Months, TimeZone, Timelike};
    use proptest::prelude::*;

    fn feedings_at(start: DateTime<Utc>, gaps: &[i64]) -> Vec<CareEvent> {
        let mut t = start;
        let mut events = vec![CareEvent::feeding("f0", t)];
        for (i, gap) in gaps.iter().enumerate() {
            t += Duration::minutes(*gap);
            events.push(CareEvent::feeding(format!("f{}", i + 1), t));
        }
        events
    }

    fn birth_months_before(now: DateTime<Utc>, months: u32) -> String {
        now.date_naive()
            .checked_sub_months(Months::new(months))
            .unwrap()
            .format("%Y-%m-%d")
            .to_string()
    }

    #[test]
    fn baseline_bands() {
        let model = FeedingModel::default();
        assert_eq!(model.baseline_interval_minutes(0), 150);
        assert_eq!(model.baseline_interval_minutes(2), 150);
        assert_eq!(model.baseline_interval_minutes(3), 210);
        assert_eq!(model.baseline_interval_minutes(5), 210);
        assert_eq!(model.baseline_interval_minutes(6), 270);
        assert_eq!(model.baseline_interval_minutes(11), 270);
        assert_eq!(model.baseline_interval_minutes(12), 300);
        assert_eq!(model.baseline_interval_minutes(40), 300);
    }

    #[test]
    fn invalid_birth_date_yields_nothing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let events = vec![CareEvent::feeding("f", now)];
        assert!(predict_next_feeding("not-a-date", &events, now).is_none());
        assert!(predict_next_feeding("2026-02-30", &events, now).is_none());
    }

    #[test]
    fn no_feedings_yields_nothing() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let sleeps = vec![CareEvent::sleep("s", now, None)];
        assert!(predict_next_feeding("2026-01-01", &[], now).is_none());
        assert!(predict_next_feeding("2026-01-01", &sleeps, now).is_none());
    }

    #[test]
    fn past_prediction_is_discarded() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let events = vec![CareEvent::feeding("f", now - Duration::hours(6))];
        assert!(predict_next_feeding("2026-01-15", &events, now).is_none());
    }

    #[test]
    fn few_events_fall_back_to_baseline() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let events = feedings_at(now - Duration::hours(4), &[120, 120]);
        let p = predict_next_feeding("2026-01-15", &events, now).unwrap();
        assert!(!p.is_personalized);
        assert_eq!(p.interval_minutes, 150);
        assert_eq!(p.confidence, 0.4);
        assert_eq!(p.next_feeding_time, now + Duration::minutes(150));
    }

    #[test]
    fn overnight_gap_is_excluded_from_cadence() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 6, 0, 0).unwrap();
        let events = feedings_at(t, &[180, 180, 600, 180, 180]);
        let feedings = feedings_sorted(&events);
        assert_eq!(average_interval_minutes(&feedings, 480), Some(180.0));
    }

    #[test]
    fn only_overnight_gaps_falls_back_to_baseline() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap();
        let events = feedings_at(now - Duration::minutes(4 * 600), &[600, 600, 600, 600]);
        let p = predict_next_feeding("2026-02-20", &events, now).unwrap();
        assert!(!p.is_personalized);
        assert_eq!(p.confidence, 0.4);
    }

    #[test]
    fn reference_scenario_blends_personal_and_baseline() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap();
        let birth = birth_months_before(now, 3);
        let gaps = [170, 175, 168, 172, 700, 180];
        let first = now - Duration::minutes(gaps.iter().sum::<i64>()) - Duration::minutes(30);
        let events = feedings_at(first, &gaps);

        let p = predict_next_feeding(&birth, &events, now).unwrap();
        assert!(p.is_personalized);
        // personal = 173, baseline = 210
        assert_eq!(p.interval_minutes, 184);
        let expected_conf = (0.5_f64 + 0.03 * events.len() as f64).min(0.9);
        assert!((p.confidence - expected_conf).abs() < 1e-9);
        assert_eq!(
            p.next_feeding_time,
            events.last().unwrap().start() + Duration::minutes(184)
        );
    }

    #[test]
    fn confidence_is_capped() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let gaps = vec![150; 30];
        let first = now - Duration::minutes(150 * 30) - Duration::minutes(10);
        let events = feedings_at(first, &gaps);
        let p = predict_next_feeding("2026-02-01", &events, now).unwrap();
        assert_eq!(p.confidence, 0.9);
    }

    #[test]
    fn unsorted_input_uses_latest_feeding() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let latest = now - Duration::minutes(30);
        let events = vec![
            CareEvent::feeding("late", latest),
            CareEvent::feeding("early", latest - Duration::hours(3)),
        ];
        let p = predict_next_feeding("2026-02-01", &events, now).unwrap();
        assert_eq!(p.next_feeding_time, latest + Duration::minutes(150));
    }

    #[test]
    fn late_evening_prediction_moves_to_next_morning() {
        // 8 months old; baseline 270
        let last = Utc.with_ymd_and_hms(2026, 9, 10, 19, 0, 0).unwrap();
        let now = last + Duration::minutes(5);
        let p = predict_next_feeding("2026-01-05", &[CareEvent::feeding("f", last)], now).unwrap();
        assert_eq!(
            p.next_feeding_time,
            Utc.with_ymd_and_hms(2026, 9, 11, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn early_morning_prediction_moves_to_six_same_day() {
        let last = Utc.with_ymd_and_hms(2026, 9, 10, 23, 30, 0).unwrap();
        let now = last + Duration::minutes(5);
        let p = predict_next_feeding("2026-01-05", &[CareEvent::feeding("f", last)], now).unwrap();
        assert_eq!(
            p.next_feeding_time,
            Utc.with_ymd_and_hms(2026, 9, 11, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn young_babies_are_fed_at_night() {
        // 1 month old; baseline 150
        let last = Utc.with_ymd_and_hms(2026, 9, 10, 21, 0, 0).unwrap();
        let now = last + Duration::minutes(5);
        let p = predict_next_feeding("2026-08-01", &[CareEvent::feeding("f", last)], now).unwrap();
        assert_eq!(p.next_feeding_time, last + Duration::minutes(150));
    }

    proptest! {
        #[test]
        fn night_suppression_lands_on_six_am(
            offset_min in 0i64..(60 * 24 * 60),
            months in 6u32..30,
        ) {
            let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let last = base + Duration::minutes(offset_min);
            let birth = last
                .date_naive()
                .checked_sub_months(Months::new(months))
                .unwrap()
                .format("%Y-%m-%d")
                .to_string();
            let model = FeedingModel::default();
            let age = age_in_months(parse_birth_date(&birth).unwrap(), last.date_naive());
            let raw = last + Duration::minutes(model.baseline_interval_minutes(age));

            let p = predict_next_feeding(&birth, &[CareEvent::feeding("f", last)], last).unwrap();

            if raw.hour() >= 22 || raw.hour() < 6 {
                let day = if raw.hour() >= 22 {
                    raw.date_naive().succ_opt().unwrap()
                } else {
                    raw.date_naive()
                };
                prop_assert_eq!(p.next_feeding_time.hour(), 6);
                prop_assert_eq!(p.next_feeding_time.minute(), 0);
                prop_assert_eq!(p.next_feeding_time.date_naive(), day);
                prop_assert_eq!(p.next_feeding_time.day(), day.day());
            } else {
                prop_assert_eq!(p.next_feeding_time, raw);
            }
        }

        #[test]
        fn cadence_average_ignores_every_long_gap(
            short in proptest::collection::vec(60i64..=480, 1..12),
            long in proptest::collection::vec(481i64..1200, 0..4),
        ) {
            let mut gaps = short.clone();
            gaps.extend(long.iter().copied());
            let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
            let events = feedings_at(start, &gaps);
            let feedings = feedings_sorted(&events);
            let expected = short.iter().sum::<i64>() as f64 / short.len() as f64;
            let avg = average_interval_minutes(&feedings, 480).unwrap();
            prop_assert!((avg - expected).abs() < 1e-9);
        }
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{ReminderOutcome, ReminderPayload, ReminderService, ReminderSlot, SLEEP_WINDOW_ID};
use crate::clock::{format_clock_time, minutes_of_day};
use crate::prediction::SleepWindowPrediction;
use crate::preferences::{NotificationPreferenceStore, ReminderFamily};
use crate::storage::{KeyValueStore, RemindersConfig};

/// Keeps the `sleep-window` reminder in step with the latest sleep prediction.
pub struct SleepReminderScheduler {
    slot: ReminderSlot,
    preferences: NotificationPreferenceStore,
    lead: Duration,
    min_confidence: f64,
}

impl SleepReminderScheduler {
    pub fn new(service: Arc<dyn ReminderService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(service, store, &RemindersConfig::default())
    }

    pub fn with_config(
        service: Arc<dyn ReminderService>,
        store: Arc<dyn KeyValueStore>,
        config: &RemindersConfig,
    ) -> Self {
        Self {
            slot: ReminderSlot::new(SLEEP_WINDOW_ID, service, store.clone()),
            preferences: NotificationPreferenceStore::new(store),
            lead: Duration::minutes(config.sleep_lead_minutes),
            min_confidence: config.sleep_min_confidence,
        }
    }

    pub fn slot(&self) -> &ReminderSlot {
        &self.slot
    }

    /// Apply the latest prediction.
    ///
    /// Called on every prediction change, including when the prediction
    /// disappears. Low confidence or a muted family clears the slot.
    pub async fn update(
        &self,
        prediction: Option<&SleepWindowPrediction>,
        now: DateTime<Utc>,
    ) -> ReminderOutcome {
        let Some(prediction) = prediction else {
            return self.slot.clear().await;
        };
        if prediction.confidence < self.min_confidence {
            tracing::debug!(
                confidence = prediction.confidence,
                "sleep prediction below reminder threshold"
            );
            return self.slot.clear().await;
        }

        let fires_at = prediction.recommended_start - self.lead;
        if !self
            .preferences
            .load()
            .allows(ReminderFamily::SleepWindow, fires_at)
        {
            tracing::debug!(%fires_at, "sleep reminder muted by preferences");
            return self.slot.clear().await;
        }

        let payload = ReminderPayload {
            title: "Sleep window coming up".into(),
            body: format!(
                "Next sleep window starts around {}",
                format_clock_time(minutes_of_day(prediction.recommended_start))
            ),
            schedule_key: prediction.recommended_start.to_rfc3339(),
            confidence: prediction.confidence,
        };
        self.slot.place(fires_at, payload, now).await
    }

    /// The owning observer is going away.
    pub async fn teardown(&self) -> ReminderOutcome {
        self.slot.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::{schedule_key_storage_key, MemoryReminderService};
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    struct Fixture {
        service: Arc<MemoryReminderService>,
        store: Arc<MemoryStore>,
        scheduler: SleepReminderScheduler,
    }

    fn fixture() -> Fixture {
        let service = Arc::new(MemoryReminderService::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = SleepReminderScheduler::new(service.clone(), store.clone());
        Fixture {
            service,
            store,
            scheduler,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn prediction(minutes_ahead: i64, confidence: f64) -> SleepWindowPrediction {
        SleepWindowPrediction {
            recommended_start: now() + Duration::minutes(minutes_ahead),
            confidence,
        }
    }

    #[tokio::test]
    async fn schedules_fifteen_minutes_before_window() {
        let f = fixture();
        let p = prediction(90, 0.7);
        assert_eq!(f.scheduler.update(Some(&p), now()).await, ReminderOutcome::Scheduled);

        let pending = f.service.pending(SLEEP_WINDOW_ID).unwrap();
        assert_eq!(pending.fires_at, now() + Duration::minutes(75));
        assert_eq!(pending.schedule_key, p.recommended_start.to_rfc3339());
    }

    #[tokio::test]
    async fn unchanged_prediction_schedules_once() {
        let f = fixture();
        let p = prediction(90, 0.7);
        f.scheduler.update(Some(&p), now()).await;
        let second = f.scheduler.update(Some(&p), now()).await;

        assert_eq!(second, ReminderOutcome::Unchanged);
        assert_eq!(f.service.schedule_calls(), 1);
    }

    #[tokio::test]
    async fn low_confidence_cancels_existing_reminder() {
        let f = fixture();
        f.scheduler.update(Some(&prediction(90, 0.7)), now()).await;
        let outcome = f.scheduler.update(Some(&prediction(90, 0.59)), now()).await;

        assert_eq!(outcome, ReminderOutcome::Cancelled);
        assert!(f.service.pending(SLEEP_WINDOW_ID).is_none());
        assert!(f
            .store
            .get(&schedule_key_storage_key(SLEEP_WINDOW_ID))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn low_confidence_never_schedules() {
        let f = fixture();
        f.scheduler.update(Some(&prediction(90, 0.5)), now()).await;
        assert_eq!(f.service.schedule_calls(), 0);
    }

    #[tokio::test]
    async fn absent_prediction_cancels() {
        let f = fixture();
        f.scheduler.update(Some(&prediction(90, 0.7)), now()).await;
        assert_eq!(f.scheduler.update(None, now()).await, ReminderOutcome::Cancelled);
        assert!(f.service.pending(SLEEP_WINDOW_ID).is_none());
    }

    #[tokio::test]
    async fn window_inside_lead_time_is_skipped() {
        let f = fixture();
        let outcome = f.scheduler.update(Some(&prediction(10, 0.8)), now()).await;
        assert_eq!(outcome, ReminderOutcome::TooLate);
        assert_eq!(f.service.schedule_calls(), 0);
    }

    #[tokio::test]
    async fn moved_window_replaces_reminder() {
        let f = fixture();
        f.scheduler.update(Some(&prediction(90, 0.7)), now()).await;
        let moved = prediction(120, 0.7);
        assert_eq!(
            f.scheduler.update(Some(&moved), now()).await,
            ReminderOutcome::Scheduled
        );
        assert_eq!(f.service.schedule_calls(), 2);
        assert_eq!(
            f.service.pending(SLEEP_WINDOW_ID).unwrap().schedule_key,
            moved.recommended_start.to_rfc3339()
        );
    }

    #[tokio::test]
    async fn failed_schedule_is_retried_on_next_update() {
        let f = fixture();
        let p = prediction(90, 0.7);
        f.service.fail_next_schedule();
        assert_eq!(f.scheduler.update(Some(&p), now()).await, ReminderOutcome::Failed);
        assert!(f.scheduler.slot().current_key().is_none());

        assert_eq!(f.scheduler.update(Some(&p), now()).await, ReminderOutcome::Scheduled);
        assert_eq!(f.service.schedule_calls(), 2);
    }

    #[tokio::test]
    async fn disabled_preference_cancels() {
        let f = fixture();
        f.scheduler.update(Some(&prediction(90, 0.7)), now()).await;
        NotificationPreferenceStore::new(f.store.clone())
            .set_enabled(ReminderFamily::SleepWindow, false)
            .unwrap();

        let outcome = f.scheduler.update(Some(&prediction(90, 0.7)), now()).await;
        assert_eq!(outcome, ReminderOutcome::Cancelled);
        assert!(f.service.pending(SLEEP_WINDOW_ID).is_none());
    }

    #[tokio::test]
    async fn teardown_cancels_unconditionally() {
        let f = fixture();
        f.scheduler.update(Some(&prediction(90, 0.7)), now()).await;
        assert_eq!(f.scheduler.teardown().await, ReminderOutcome::Cancelled);
        assert!(f.service.pending(SLEEP_WINDOW_ID).is_none());
        assert!(f.scheduler.slot().current_key().is_none());
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::{FEEDING_DUE_ID, ReminderOutcome, ReminderPayload, ReminderService, ReminderSlot};
use crate::clock::{format_clock_time, minutes_of_day};
use crate::prediction::FeedingPrediction;
use crate::preferences::{NotificationPreferenceStore, ReminderFamily};
use crate::storage::{KeyValueStore, RemindersConfig};

/// Keeps the `feeding-due` reminder in step with the latest feeding prediction.
///
/// Baseline (non-personalized) predictions still schedule.
pub struct FeedingReminderScheduler {
    slot: ReminderSlot,
    preferences: NotificationPreferenceStore,
    lead: Duration,
}

impl FeedingReminderScheduler {
    pub fn new(service: Arc<dyn ReminderService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(service, store, &RemindersConfig::default())
    }

    pub fn with_config(
        service: Arc<dyn ReminderService>,
        store: Arc<dyn KeyValueStore>,
        config: &RemindersConfig,
    ) -> Self {
        Self {
            slot: ReminderSlot::new(FEEDING_DUE_ID, service, store.clone()),
            preferences: NotificationPreferenceStore::new(store),
            lead: Duration::minutes(config.feeding_lead_minutes),
        }
    }

    pub fn slot(&self) -> &ReminderSlot {
        &self.slot
    }

    pub async fn update(
        &self,
        prediction: Option<&FeedingPrediction>,
        now: DateTime<Utc>,
    ) -> ReminderOutcome {
        let Some(prediction) = prediction else {
            return self.slot.clear().await;
        };

        let fires_at = prediction.next_feeding_time - self.lead;
        if !self
            .preferences
            .load()
            .allows(ReminderFamily::FeedingDue, fires_at)
        {
            tracing::debug!(%fires_at, "feeding reminder muted by preferences");
            return self.slot.clear().await;
        }

        let payload = ReminderPayload {
            title: "Feeding due soon".into(),
            body: format!(
                "Next feeding expected around {} (every ~{} min)",
                format_clock_time(minutes_of_day(prediction.next_feeding_time)),
                prediction.interval_minutes
            ),
            schedule_key: prediction.next_feeding_time.to_rfc3339(),
            confidence: prediction.confidence,
        };
        self.slot.place(fires_at, payload, now).await
    }

    pub async fn teardown(&self) -> ReminderOutcome {
        self.slot.clear().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::MemoryReminderService;
    use crate::storage::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn prediction(minutes_ahead: i64, personalized: bool) -> FeedingPrediction {
        FeedingPrediction {
            next_feeding_time: now() + Duration::minutes(minutes_ahead),
            interval_minutes: 180,
            is_personalized: personalized,
            confidence: if personalized { 0.71 } else { 0.4 },
        }
    }

    fn scheduler() -> (Arc<MemoryReminderService>, Arc<MemoryStore>, FeedingReminderScheduler) {
        let service = Arc::new(MemoryReminderService::new());
        let store = Arc::new(MemoryStore::new());
        let scheduler = FeedingReminderScheduler::new(service.clone(), store.clone());
        (service, store, scheduler)
    }

    #[tokio::test]
    async fn baseline_prediction_schedules_ten_minutes_early() {
        let (service, _, scheduler) = scheduler();
        let outcome = scheduler.update(Some(&prediction(60, false)), now()).await;

        assert_eq!(outcome, ReminderOutcome::Scheduled);
        let pending = service.pending(FEEDING_DUE_ID).unwrap();
        assert_eq!(pending.fires_at, now() + Duration::minutes(50));
        let payload = service.payload(FEEDING_DUE_ID).unwrap();
        assert!(payload.body.contains("13:00"));
    }

    #[tokio::test]
    async fn repeated_prediction_is_deduplicated() {
        let (service, _, scheduler) = scheduler();
        let p = prediction(60, true);
        scheduler.update(Some(&p), now()).await;
        scheduler.update(Some(&p), now() + Duration::minutes(5)).await;
        assert_eq!(service.schedule_calls(), 1);
    }

    #[tokio::test]
    async fn quiet_hours_suppress_feeding_reminder() {
        let (service, store, scheduler) = scheduler();
        NotificationPreferenceStore::new(store)
            .update(|p| {
                p.quiet_hours.enabled = true;
                p.quiet_hours.start = "12:30".into();
                p.quiet_hours.end = "14:00".into();
            })
            .unwrap();

        let outcome = scheduler.update(Some(&prediction(60, true)), now()).await;
        assert_eq!(outcome, ReminderOutcome::Cancelled);
        assert_eq!(service.schedule_calls(), 0);
    }

    #[tokio::test]
    async fn teardown_clears_slot() {
        let (service, _, scheduler) = scheduler();
        scheduler.update(Some(&prediction(60, true)), now()).await;
        scheduler.teardown().await;
        assert!(service.pending(FEEDING_DUE_ID).is_none());
    }
}

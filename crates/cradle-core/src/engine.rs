//! Wiring from the remote event store to reminders.
//!
//! `CareEngine` is what a screen holds: on every history change it fetches,
//! predicts and hands the prediction to the matching reminder scheduler.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::CoreError;
use crate::events::{CareEvent, CareEventKind, CareEventRecord};
use crate::prediction::{
    FeedingIntervalPredictor, FeedingPrediction, SleepWindowPrediction, SleepWindowPredictor,
    WakeWindowPredictor,
};
use crate::reminders::{
    FeedingReminderScheduler, ReminderOutcome, ReminderService, SleepReminderScheduler,
};
use crate::stale::{StaleSleepGuard, TrackingResume};
use crate::storage::{Config, KeyValueStore};

/// How far back the engine looks when predicting.
pub const HISTORY_DAYS: i64 = 7;

/// The remote care-event store.
#[async_trait]
pub trait CareEventStore: Send + Sync {
    /// Events of `kind` starting in `[from, to]`, any order.
    async fn list_events(
        &self,
        kind: CareEventKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CareEventRecord>, CoreError>;

    /// Open events of `kind` starting at or before `to`, however old.
    async fn list_open_events(
        &self,
        kind: CareEventKind,
        to: DateTime<Utc>,
    ) -> Result<Vec<CareEventRecord>, CoreError> {
        let records = self.list_events(kind, DateTime::<Utc>::MIN_UTC, to).await?;
        Ok(records.into_iter().filter(|r| !r.has_end()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepRefresh {
    pub resume: TrackingResume,
    pub prediction: Option<SleepWindowPrediction>,
    pub reminder: ReminderOutcome,
}

pub struct CareEngine {
    events: Arc<dyn CareEventStore>,
    birth_date: String,
    feeding: FeedingIntervalPredictor,
    sleep: Arc<dyn SleepWindowPredictor>,
    stale: StaleSleepGuard,
    feeding_reminders: FeedingReminderScheduler,
    sleep_reminders: SleepReminderScheduler,
}

impl CareEngine {
    pub fn new(
        events: Arc<dyn CareEventStore>,
        reminders: Arc<dyn ReminderService>,
        store: Arc<dyn KeyValueStore>,
        birth_date: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            events,
            birth_date: birth_date.into(),
            feeding: FeedingIntervalPredictor::with_model(config.feeding_model()),
            sleep: Arc::new(WakeWindowPredictor::default()),
            stale: StaleSleepGuard::with_max_open_hours(config.stale.max_open_sleep_hours),
            feeding_reminders: FeedingReminderScheduler::with_config(
                reminders.clone(),
                store.clone(),
                &config.reminders,
            ),
            sleep_reminders: SleepReminderScheduler::with_config(
                reminders,
                store,
                &config.reminders,
            ),
        }
    }

    /// Swap in a different sleep model.
    pub fn with_sleep_predictor(mut self, predictor: Arc<dyn SleepWindowPredictor>) -> Self {
        self.sleep = predictor;
        self
    }

    async fn fetch(
        &self,
        kind: CareEventKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<CareEventRecord>, CoreError> {
        self.events
            .list_events(kind, now - Duration::days(HISTORY_DAYS), now)
            .await
            .inspect_err(|e| tracing::warn!(%kind, "failed to fetch care events: {e}"))
    }

    /// Re-predict the next feeding and update its reminder.
    ///
    /// A fetch failure leaves the pending reminder as it was.
    pub async fn refresh_feeding(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<FeedingPrediction>, CoreError> {
        let records = self.fetch(CareEventKind::Feeding, now).await?;
        let events = parse_records(&records);
        let prediction = self.feeding.predict(&self.birth_date, &events, now);
        self.feeding_reminders.update(prediction.as_ref(), now).await;
        Ok(prediction)
    }

    /// Inspect open sleeps, re-predict the next sleep window and update its
    /// reminder. Stale open entries are reported and kept out of the
    /// prediction. Open sleeps older than the history window are still
    /// inspected so they can be auto-closed.
    pub async fn refresh_sleep(&self, now: DateTime<Utc>) -> Result<SleepRefresh, CoreError> {
        let mut records = self.fetch(CareEventKind::Sleep, now).await?;
        let open = self
            .events
            .list_open_events(CareEventKind::Sleep, now)
            .await
            .inspect_err(|e| tracing::warn!("failed to fetch open sleeps: {e}"))?;
        for record in open {
            if !records.iter().any(|r| r.id == record.id) {
                records.push(record);
            }
        }
        let resume = self.stale.resolve(&records, now);

        let live: Vec<CareEventRecord> = records
            .into_iter()
            .filter(|r| !self.stale.is_stale(r, now))
            .collect();
        let events = parse_records(&live);
        let prediction = self.sleep.predict(&self.birth_date, &events, now);
        let reminder = self.sleep_reminders.update(prediction.as_ref(), now).await;

        Ok(SleepRefresh {
            resume,
            prediction,
            reminder,
        })
    }

    /// The owning screen is going away; clear both reminders.
    pub async fn teardown(&self) {
        self.feeding_reminders.teardown().await;
        self.sleep_reminders.teardown().await;
    }
}

fn parse_records(records: &[CareEventRecord]) -> Vec<CareEvent> {
    records
        .iter()
        .filter_map(|r| match r.parse() {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(id = %r.id, "skipping care event: {e}");
                None
            }
        })
        .collect()
}

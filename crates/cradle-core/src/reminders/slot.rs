use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use super::{ReminderPayload, ReminderService};
use crate::storage::KeyValueStore;

/// Durable key holding the schedule key last applied to `identifier`.
pub fn schedule_key_storage_key(identifier: &str) -> String {
    format!("reminder.{identifier}.schedule_key")
}

/// What a slot operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderOutcome {
    /// A new reminder is pending.
    Scheduled,
    /// The pending reminder already announces this window.
    Unchanged,
    /// The fire time has already passed; nothing was touched.
    TooLate,
    /// The slot was cleared.
    Cancelled,
    /// The service refused; dedup state is untouched so the next update retries.
    Failed,
}

/// One reminder identifier on the local reminder service.
///
/// Every operation holds the slot's async mutex for its whole
/// cancel/schedule sequence, so two updates can never interleave.
pub struct ReminderSlot {
    identifier: &'static str,
    service: Arc<dyn ReminderService>,
    store: Arc<dyn KeyValueStore>,
    lock: Mutex<()>,
}

impl ReminderSlot {
    pub fn new(
        identifier: &'static str,
        service: Arc<dyn ReminderService>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            identifier,
            service,
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn identifier(&self) -> &'static str {
        self.identifier
    }

    /// Schedule key of the reminder currently believed pending.
    pub fn current_key(&self) -> Option<String> {
        match self.store.get(&schedule_key_storage_key(self.identifier)) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(identifier = self.identifier, "failed to read schedule key: {e}");
                None
            }
        }
    }

    fn record_key(&self, key: &str) {
        if let Err(e) = self
            .store
            .set(&schedule_key_storage_key(self.identifier), key)
        {
            tracing::warn!(identifier = self.identifier, "failed to record schedule key: {e}");
        }
    }

    fn clear_key(&self) {
        if let Err(e) = self.store.remove(&schedule_key_storage_key(self.identifier)) {
            tracing::warn!(identifier = self.identifier, "failed to clear schedule key: {e}");
        }
    }

    /// Make `payload` the pending reminder, firing at `fires_at`.
    pub async fn place(
        &self,
        fires_at: DateTime<Utc>,
        payload: ReminderPayload,
        now: DateTime<Utc>,
    ) -> ReminderOutcome {
        let _guard = self.lock.lock().await;

        if fires_at <= now {
            tracing::debug!(identifier = self.identifier, %fires_at, "reminder time already passed");
            return ReminderOutcome::TooLate;
        }

        if self.current_key().as_deref() == Some(payload.schedule_key.as_str()) {
            tracing::debug!(
                identifier = self.identifier,
                key = %payload.schedule_key,
                "reminder unchanged"
            );
            return ReminderOutcome::Unchanged;
        }

        if let Err(e) = self.service.cancel(self.identifier).await {
            tracing::warn!(identifier = self.identifier, "failed to cancel previous reminder: {e}");
        }

        let key = payload.schedule_key.clone();
        match self.service.schedule(self.identifier, fires_at, payload).await {
            Ok(()) => {
                self.record_key(&key);
                tracing::info!(identifier = self.identifier, %fires_at, key = %key, "reminder scheduled");
                ReminderOutcome::Scheduled
            }
            Err(e) => {
                tracing::warn!(identifier = self.identifier, "failed to schedule reminder: {e}");
                ReminderOutcome::Failed
            }
        }
    }

    /// Cancel whatever is pending and forget the dedup key. Idempotent.
    pub async fn clear(&self) -> ReminderOutcome {
        let _guard = self.lock.lock().await;

        if let Err(e) = self.service.cancel(self.identifier).await {
            tracing::warn!(identifier = self.identifier, "failed to cancel reminder: {e}");
            return ReminderOutcome::Failed;
        }
        if self.current_key().is_some() {
            tracing::info!(identifier = self.identifier, "reminder cancelled");
        }
        self.clear_key();
        ReminderOutcome::Cancelled
    }
}

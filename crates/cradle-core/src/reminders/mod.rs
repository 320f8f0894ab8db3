//! Local reminder scheduling.
//!
//! Each reminder family owns exactly one slot on the device's local
//! reminder service, addressed by a fixed identifier. Schedulers turn
//! predictions into at most one pending reminder per slot.

mod feeding;
mod sleep;
mod slot;

pub use feeding::FeedingReminderScheduler;
pub use sleep::SleepReminderScheduler;
pub use slot::{schedule_key_storage_key, ReminderOutcome, ReminderSlot};

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ReminderError;

pub const SLEEP_WINDOW_ID: &str = "sleep-window";
pub const FEEDING_DUE_ID: &str = "feeding-due";

/// What the reminder shows when it fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub title: String,
    pub body: String,
    /// The predicted instant this reminder announces (RFC 3339).
    pub schedule_key: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub identifier: String,
    pub fires_at: DateTime<Utc>,
    pub schedule_key: String,
}

/// The device's local reminder service.
///
/// Scheduling under an identifier that already has a pending reminder
/// replaces it. Cancelling an identifier with nothing pending succeeds.
#[async_trait]
pub trait ReminderService: Send + Sync {
    async fn schedule(
        &self,
        identifier: &str,
        fires_at: DateTime<Utc>,
        payload: ReminderPayload,
    ) -> Result<(), ReminderError>;

    async fn cancel(&self, identifier: &str) -> Result<(), ReminderError>;

    async fn list_scheduled(&self) -> Result<Vec<ScheduledReminder>, ReminderError>;
}

/// Process-local reminder service.
///
/// Keeps pending reminders in memory and counts calls.
/// `fail_next_schedule` and `fail_next_cancel` simulate a platform refusal.
#[derive(Debug, Default)]
pub struct MemoryReminderService {
    state: Mutex<MemoryReminderState>,
}

#[derive(Debug, Default)]
struct MemoryReminderState {
    pending: HashMap<String, (ScheduledReminder, ReminderPayload)>,
    schedule_calls: usize,
    cancel_calls: usize,
    fail_next_schedule: bool,
    fail_next_cancel: bool,
}

impl MemoryReminderService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryReminderState> {
        // A poisoned lock only means a test panicked mid-call; the map is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn schedule_calls(&self) -> usize {
        self.lock().schedule_calls
    }

    pub fn cancel_calls(&self) -> usize {
        self.lock().cancel_calls
    }

    pub fn fail_next_schedule(&self) {
        self.lock().fail_next_schedule = true;
    }

    pub fn fail_next_cancel(&self) {
        self.lock().fail_next_cancel = true;
    }

    pub fn pending(&self, identifier: &str) -> Option<ScheduledReminder> {
        self.lock().pending.get(identifier).map(|(r, _)| r.clone())
    }

    pub fn payload(&self, identifier: &str) -> Option<ReminderPayload> {
        self.lock().pending.get(identifier).map(|(_, p)| p.clone())
    }
}

#[async_trait]
impl ReminderService for MemoryReminderService {
    async fn schedule(
        &self,
        identifier: &str,
        fires_at: DateTime<Utc>,
        payload: ReminderPayload,
    ) -> Result<(), ReminderError> {
        let mut state = self.lock();
        state.schedule_calls += 1;
        if std::mem::take(&mut state.fail_next_schedule) {
            return Err(ReminderError::ScheduleFailed {
                identifier: identifier.to_string(),
                message: "reminder service unavailable".into(),
            });
        }
        let reminder = ScheduledReminder {
            identifier: identifier.to_string(),
            fires_at,
            schedule_key: payload.schedule_key.clone(),
        };
        state
            .pending
            .insert(identifier.to_string(), (reminder, payload));
        Ok(())
    }

    async fn cancel(&self, identifier: &str) -> Result<(), ReminderError> {
        let mut state = self.lock();
        state.cancel_calls += 1;
        if std::mem::take(&mut state.fail_next_cancel) {
            return Err(ReminderError::CancelFailed {
                identifier: identifier.to_string(),
                message: "reminder service unavailable".into(),
            });
        }
        state.pending.remove(identifier);
        Ok(())
    }

    async fn list_scheduled(&self) -> Result<Vec<ScheduledReminder>, ReminderError> {
        let state = self.lock();
        let mut reminders: Vec<ScheduledReminder> =
            state.pending.values().map(|(r, _)| r.clone()).collect();
        reminders.sort_by_key(|r| r.fires_at);
        Ok(reminders)
    }
}

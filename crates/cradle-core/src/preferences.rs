//! Notification preferences.
//!
//! One JSON document under a single key. A missing or corrupt document reads
//! as the defaults so a bad write never silences every reminder.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{is_within_clock_range, minutes_of_day, parse_clock_time};
use crate::error::CoreError;
use crate::storage::KeyValueStore;

pub const PREFERENCES_KEY: &str = "notification.preferences";

/// Reminder families that can be switched off individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFamily {
    SleepWindow,
    FeedingDue,
    PartnerActivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuietHours {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_quiet_start")]
    pub start: String, // HH:MM
    #[serde(default = "default_quiet_end")]
    pub end: String, // HH:MM
}

fn default_quiet_start() -> String {
    "22:00".into()
}
fn default_quiet_end() -> String {
    "06:00".into()
}
fn default_true() -> bool {
    true
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: default_quiet_start(),
            end: default_quiet_end(),
        }
    }
}

impl QuietHours {
    /// Whether `t` falls inside enabled quiet hours. Unparsable boundaries
    /// disable the window.
    pub fn covers(&self, t: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match (parse_clock_time(&self.start), parse_clock_time(&self.end)) {
            (Some(start), Some(end)) => is_within_clock_range(minutes_of_day(t), start, end),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    #[serde(default = "default_true")]
    pub sleep_reminders: bool,
    #[serde(default = "default_true")]
    pub feeding_reminders: bool,
    #[serde(default = "default_true")]
    pub partner_activity: bool,
    #[serde(default)]
    pub quiet_hours: QuietHours,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            sleep_reminders: true,
            feeding_reminders: true,
            partner_activity: true,
            quiet_hours: QuietHours::default(),
        }
    }
}

impl NotificationPreferences {
    pub fn is_enabled(&self, family: ReminderFamily) -> bool {
        match family {
            ReminderFamily::SleepWindow => self.sleep_reminders,
            ReminderFamily::FeedingDue => self.feeding_reminders,
            ReminderFamily::PartnerActivity => self.partner_activity,
        }
    }

    /// Whether a reminder of `family` may fire at `fires_at`.
    pub fn allows(&self, family: ReminderFamily, fires_at: DateTime<Utc>) -> bool {
        self.is_enabled(family) && !self.quiet_hours.covers(fires_at)
    }
}

#[derive(Clone)]
pub struct NotificationPreferenceStore {
    store: Arc<dyn KeyValueStore>,
}

impl NotificationPreferenceStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> NotificationPreferences {
        match self.store.get(PREFERENCES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!("ignoring corrupt notification preferences: {e}");
                NotificationPreferences::default()
            }),
            Ok(None) => NotificationPreferences::default(),
            Err(e) => {
                tracing::warn!("failed to read notification preferences: {e}");
                NotificationPreferences::default()
            }
        }
    }

    pub fn save(&self, prefs: &NotificationPreferences) -> Result<(), CoreError> {
        let raw = serde_json::to_string(prefs)?;
        self.store.set(PREFERENCES_KEY, &raw)
    }

    /// Read-modify-write of the single preferences key.
    pub fn update(
        &self,
        f: impl FnOnce(&mut NotificationPreferences),
    ) -> Result<NotificationPreferences, CoreError> {
        let mut prefs = self.load();
        f(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }

    pub fn set_enabled(&self, family: ReminderFamily, enabled: bool) -> Result<(), CoreError> {
        self.update(|p| match family {
            ReminderFamily::SleepWindow => p.sleep_reminders = enabled,
            ReminderFamily::FeedingDue => p.feeding_reminders = enabled,
            ReminderFamily::PartnerActivity => p.partner_activity = enabled,
        })?;
        Ok(())
    }
}

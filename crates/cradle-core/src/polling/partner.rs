use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::PartnerActivitySource;
use crate::error::CoreError;
use crate::events::{parse_timestamp, CareEventKind, CareEventRecord};
use crate::preferences::{NotificationPreferenceStore, ReminderFamily};
use crate::storage::KeyValueStore;

/// Durable marker: start time of the newest partner item already surfaced.
pub const LAST_SEEN_KEY: &str = "partner.last_seen_at";

/// Durable set of surfaced partner item ids, keyed to their start times.
pub const SEEN_IDS_KEY: &str = "partner.seen_ids";

/// How far before the newest surfaced item the feed is re-read. Items
/// logged after the fact inside this window are still picked up.
pub const BACKFILL_WINDOW_HOURS: i64 = 24;

/// Remote feed of the linked partner's care events.
#[async_trait]
pub trait PartnerFeed: Send + Sync {
    /// Partner events starting after `since` (all of them when `None`).
    async fn events_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CareEventRecord>, CoreError>;

    async fn unread_count(&self) -> Result<u32, CoreError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

/// Presents a notification immediately. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn show(&self, notification: Notification);
}

/// Turns new partner activity into notifications.
pub struct PartnerActivityNotifier {
    feed: Arc<dyn PartnerFeed>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn KeyValueStore>,
    preferences: NotificationPreferenceStore,
}

impl PartnerActivityNotifier {
    pub fn new(
        feed: Arc<dyn PartnerFeed>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            feed,
            sink,
            preferences: NotificationPreferenceStore::new(store.clone()),
            store,
        }
    }

    fn last_seen(&self) -> Option<DateTime<Utc>> {
        match self.store.get(LAST_SEEN_KEY) {
            Ok(Some(raw)) => parse_timestamp(&raw),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("failed to read partner marker: {e}");
                None
            }
        }
    }

    fn seen_ids(&self) -> BTreeMap<String, DateTime<Utc>> {
        let raw = match self.store.get(SEEN_IDS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!("failed to read seen partner ids: {e}");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("discarding corrupt seen partner ids: {e}");
            BTreeMap::new()
        })
    }

    /// Record `fresh` as surfaced. The id set is written before the marker
    /// so a failed marker write only widens the next read.
    fn remember(
        &self,
        mut seen: BTreeMap<String, DateTime<Utc>>,
        last_seen: Option<DateTime<Utc>>,
        fresh: &[(DateTime<Utc>, CareEventRecord)],
    ) -> Result<(), CoreError> {
        let newest = fresh
            .iter()
            .map(|(start, _)| *start)
            .chain(last_seen)
            .max();
        for (start, record) in fresh {
            seen.insert(record.id.clone(), *start);
        }
        if let Some(newest) = newest {
            let horizon = newest - Duration::hours(BACKFILL_WINDOW_HOURS);
            seen.retain(|_, start| *start > horizon);
        }

        self.store.set(SEEN_IDS_KEY, &serde_json::to_string(&seen)?)?;
        if let Some(newest) = newest {
            self.store.set(LAST_SEEN_KEY, &newest.to_rfc3339())?;
        }
        Ok(())
    }
}

fn describe(record: &CareEventRecord) -> String {
    match record.kind() {
        Ok(CareEventKind::Feeding) => "Your partner logged a feeding".into(),
        Ok(CareEventKind::Sleep) if record.has_end() => "Your partner logged a nap".into(),
        Ok(CareEventKind::Sleep) => "Your partner started a sleep".into(),
        Ok(CareEventKind::Diaper) => "Your partner changed a diaper".into(),
        Err(_) => "Your partner logged an event".into(),
    }
}

#[async_trait]
impl PartnerActivitySource for PartnerActivityNotifier {
    async fn fetch_new_partner_activity(&self) -> Result<u32, CoreError> {
        let last_seen = self.last_seen();
        let since = last_seen.map(|t| t - Duration::hours(BACKFILL_WINDOW_HOURS));
        let records = self.feed.events_since(since).await?;
        let seen = self.seen_ids();

        let mut fresh: Vec<(DateTime<Utc>, CareEventRecord)> = records
            .into_iter()
            .filter_map(|r| r.start().map(|start| (start, r)))
            .filter(|(start, _)| since.map_or(true, |since| *start > since))
            .filter(|(_, r)| !seen.contains_key(&r.id))
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        fresh.sort_by_key(|(start, _)| *start);
        fresh.dedup_by(|a, b| a.1.id == b.1.id);

        // Persist first: a failed write must not cause a repeat notification.
        self.remember(seen, last_seen, &fresh)?;

        let notify = self.preferences.load().is_enabled(ReminderFamily::PartnerActivity);
        if notify {
            for (_, record) in &fresh {
                self.sink.show(Notification {
                    title: "Partner activity".into(),
                    body: describe(record),
                    data: serde_json::json!({ "event_id": record.id, "kind": record.kind }),
                });
            }
        } else {
            tracing::debug!(count = fresh.len(), "partner notifications muted");
        }
        Ok(fresh.len() as u32)
    }

    async fn fetch_unread_count(&self) -> Result<u32, CoreError> {
        self.feed.unread_count().await
    }
}

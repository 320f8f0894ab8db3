//! Shared partner-activity polling.
//!
//! Any number of observers can ask for partner updates; the coordinator
//! runs one timer and at most one in-flight poll for all of them.

mod coordinator;
mod partner;

pub use coordinator::{PollingCoordinator, PollingSnapshot, Subscription};
pub use partner::{
    Notification, NotificationSink, PartnerActivityNotifier, PartnerFeed,
    BACKFILL_WINDOW_HOURS, LAST_SEEN_KEY, SEEN_IDS_KEY,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// The remote side of one poll.
#[async_trait]
pub trait PartnerActivitySource: Send + Sync {
    /// Pull partner activity since the last poll and surface it. Returns the
    /// number of new items.
    async fn fetch_new_partner_activity(&self) -> Result<u32, CoreError>;

    async fn fetch_unread_count(&self) -> Result<u32, CoreError>;
}

/// Application lifecycle as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycle {
    #[default]
    Active,
    Background,
    /// Suspended or transitioning; no network work.
    Inactive,
}

impl AppLifecycle {
    pub fn allows_polling(self) -> bool {
        !matches!(self, AppLifecycle::Inactive)
    }
}

/// Identifies one observer's subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionToken(Uuid);

impl SubscriptionToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    #[default]
    Healthy,
    Degraded,
}

/// Broadcast to every subscriber after a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerUpdate {
    pub unread_count: u32,
    pub connectivity: Connectivity,
    pub at: DateTime<Utc>,
}

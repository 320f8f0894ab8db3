//! Detection of abandoned open sleep entries.
//!
//! A sleep that nobody closed (app killed mid-session, crash) must not keep
//! reporting "currently sleeping" for days. Entries open longer than the
//! ceiling are judged stale and get a synthetic close time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{CareEventKind, CareEventRecord};

/// Hard ceiling for a single sleep session.
pub const MAX_OPEN_SLEEP_HOURS: i64 = 24;

/// Outcome of inspecting the open sleep entries after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingResume {
    /// The open entry the UI should keep tracking, if any.
    pub resume: Option<CareEventRecord>,
    /// Stale entries that should be closed.
    pub auto_close: Vec<AutoClose>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoClose {
    pub id: String,
    /// `None` when the start could not be parsed; the caller picks its own
    /// close time or deletes the row.
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct StaleSleepGuard {
    max_open: Duration,
}

impl Default for StaleSleepGuard {
    fn default() -> Self {
        Self {
            max_open: Duration::hours(MAX_OPEN_SLEEP_HOURS),
        }
    }
}

impl StaleSleepGuard {
    pub fn with_max_open_hours(hours: i64) -> Self {
        Self {
            max_open: Duration::hours(hours.max(1)),
        }
    }

    pub fn max_open(&self) -> Duration {
        self.max_open
    }

    /// Closed entries are never stale. Open entries with an unparsable start
    /// are always stale.
    pub fn is_stale(&self, entry: &CareEventRecord, now: DateTime<Utc>) -> bool {
        if entry.has_end() {
            return false;
        }
        match entry.start() {
            Some(start) => now - start > self.max_open,
            None => true,
        }
    }

    pub fn auto_close_time(&self, entry: &CareEventRecord) -> Option<DateTime<Utc>> {
        entry.start().map(|start| start + self.max_open)
    }

    /// First open sleep, in input order, that is still fresh. Other kinds
    /// are skipped.
    pub fn find_fresh_open_entry<'a>(
        &self,
        entries: &'a [CareEventRecord],
        now: DateTime<Utc>,
    ) -> Option<&'a CareEventRecord> {
        entries
            .iter()
            .filter(|e| is_sleep(e))
            .find(|e| !e.has_end() && !self.is_stale(e, now))
    }

    pub fn resolve(&self, entries: &[CareEventRecord], now: DateTime<Utc>) -> TrackingResume {
        let auto_close: Vec<AutoClose> = entries
            .iter()
            .filter(|e| is_sleep(e) && self.is_stale(e, now))
            .map(|e| AutoClose {
                id: e.id.clone(),
                end: self.auto_close_time(e),
            })
            .collect();
        if !auto_close.is_empty() {
            tracing::info!(count = auto_close.len(), "found stale open sleep entries");
        }
        TrackingResume {
            resume: self.find_fresh_open_entry(entries, now).cloned(),
            auto_close,
        }
    }
}

fn is_sleep(entry: &CareEventRecord) -> bool {
    matches!(entry.kind(), Ok(CareEventKind::Sleep))
}

pub fn is_stale(entry: &CareEventRecord, now: DateTime<Utc>) -> bool {
    StaleSleepGuard::default().is_stale(entry, now)
}

pub fn auto_close_time(entry: &CareEventRecord) -> Option<DateTime<Utc>> {
    StaleSleepGuard::default().auto_close_time(entry)
}

pub fn find_fresh_open_entry(
    entries: &[CareEventRecord],
    now: DateTime<Utc>,
) -> Option<&CareEventRecord> {
    StaleSleepGuard::default().find_fresh_open_entry(entries, now)
}

pub fn resolve_open_sleep(entries: &[CareEventRecord], now: DateTime<Utc>) -> TrackingResume {
    StaleSleepGuard::default().resolve(entries, now)
}

pub mod clock;
pub mod config;
pub mod predict;
pub mod prefs;
pub mod reminders;
pub mod stale;

use std::path::Path;

use chrono::{DateTime, Utc};
use cradle_core::events::parse_timestamp;
use cradle_core::CareEventRecord;

/// Read a JSON array of event records.
pub fn load_records(path: &Path) -> Result<Vec<CareEventRecord>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let records: Vec<CareEventRecord> = serde_json::from_str(&content)
        .map_err(|e| format!("invalid event file {}: {e}", path.display()))?;
    Ok(records)
}

/// `--now` override, defaulting to the wall clock.
pub fn resolve_now(now: Option<&str>) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match now {
        Some(raw) => parse_timestamp(raw)
            .ok_or_else(|| format!("invalid --now timestamp: {raw}").into()),
        None => Ok(Utc::now()),
    }
}

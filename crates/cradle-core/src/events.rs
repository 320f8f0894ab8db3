use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CareEventKind {
    Feeding,
    Sleep,
    Diaper,
}

impl CareEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CareEventKind::Feeding => "feeding",
            CareEventKind::Sleep => "sleep",
            CareEventKind::Diaper => "diaper",
        }
    }
}

impl std::fmt::Display for CareEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CareEventKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "feeding" | "feed" => Ok(CareEventKind::Feeding),
            "sleep" => Ok(CareEventKind::Sleep),
            "diaper" => Ok(CareEventKind::Diaper),
            other => Err(ValidationError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedingMethod {
    Breast,
    Bottle,
    Solid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreastSide {
    Left,
    Right,
    Both,
}

/// A logged care event.
///
/// Feedings and sleeps are spans that may still be open (`end == None`).
/// Diapers are instantaneous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CareEvent {
    Feeding {
        id: String,
        start: DateTime<Utc>,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
        #[serde(default)]
        method: Option<FeedingMethod>,
        #[serde(default)]
        amount_ml: Option<u32>,
        #[serde(default)]
        side: Option<BreastSide>,
    },
    Sleep {
        id: String,
        start: DateTime<Utc>,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
        #[serde(default)]
        location: Option<String>,
    },
    Diaper {
        id: String,
        at: DateTime<Utc>,
        #[serde(default)]
        wet: bool,
        #[serde(default)]
        dirty: bool,
    },
}

impl CareEvent {
    /// A closed-or-open feeding with no optional attributes.
    pub fn feeding(id: impl Into<String>, start: DateTime<Utc>) -> Self {
        CareEvent::Feeding {
            id: id.into(),
            start,
            end: None,
            method: None,
            amount_ml: None,
            side: None,
        }
    }

    pub fn sleep(
        id: impl Into<String>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        CareEvent::Sleep {
            id: id.into(),
            start,
            end,
            location: None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            CareEvent::Feeding { id, .. } | CareEvent::Sleep { id, .. } | CareEvent::Diaper { id, .. } => id,
        }
    }

    pub fn kind(&self) -> CareEventKind {
        match self {
            CareEvent::Feeding { .. } => CareEventKind::Feeding,
            CareEvent::Sleep { .. } => CareEventKind::Sleep,
            CareEvent::Diaper { .. } => CareEventKind::Diaper,
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        match self {
            CareEvent::Feeding { start, .. } | CareEvent::Sleep { start, .. } => *start,
            CareEvent::Diaper { at, .. } => *at,
        }
    }

    /// End of the span. Diapers end where they start.
    pub fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            CareEvent::Feeding { end, .. } | CareEvent::Sleep { end, .. } => *end,
            CareEvent::Diaper { at, .. } => Some(*at),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end().is_none()
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end().map(|end| end - self.start())
    }
}

/// A care event row as the remote store hands it out.
///
/// Timestamps are RFC 3339 strings and are not guaranteed to parse; kind
/// specific details live in `attributes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareEventRecord {
    pub id: String,
    pub kind: String,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl CareEventRecord {
    pub fn new(
        id: impl Into<String>,
        kind: CareEventKind,
        start_time: impl Into<String>,
        end_time: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.as_str().to_string(),
            start_time: start_time.into(),
            end_time,
            attributes: serde_json::Value::Null,
        }
    }

    /// Parsed start, or `None` when the stored value is not a timestamp.
    pub fn start(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.start_time)
    }

    /// Whether the row carries any end value at all, parsable or not.
    pub fn has_end(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn kind(&self) -> Result<CareEventKind, ValidationError> {
        self.kind.parse()
    }

    /// Convert into a typed [`CareEvent`].
    ///
    /// # Errors
    /// Fails on an unknown kind, an unparsable timestamp, or an end before
    /// the start.
    pub fn parse(&self) -> Result<CareEvent, ValidationError> {
        let kind = self.kind()?;
        let start = self
            .start()
            .ok_or_else(|| ValidationError::InvalidTimestamp {
                field: "start_time".into(),
                value: self.start_time.clone(),
            })?;
        let end = match &self.end_time {
            Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
                ValidationError::InvalidTimestamp {
                    field: "end_time".into(),
                    value: raw.clone(),
                }
            })?),
            None => None,
        };
        if let Some(end) = end {
            if end < start {
                return Err(ValidationError::InvalidTimeRange { start, end });
            }
        }

        let attr = |key: &str| self.attributes.get(key);
        let event = match kind {
            CareEventKind::Feeding => CareEvent::Feeding {
                id: self.id.clone(),
                start,
                end,
                method: attr("method").and_then(|v| serde_json::from_value(v.clone()).ok()),
                amount_ml: attr("amount_ml")
                    .and_then(|v| v.as_u64())
                    .and_then(|v| u32::try_from(v).ok()),
                side: attr("side").and_then(|v| serde_json::from_value(v.clone()).ok()),
            },
            CareEventKind::Sleep => CareEvent::Sleep {
                id: self.id.clone(),
                start,
                end,
                location: attr("location").and_then(|v| v.as_str()).map(str::to_string),
            },
            CareEventKind::Diaper => CareEvent::Diaper {
                id: self.id.clone(),
                at: start,
                wet: attr("wet").and_then(|v| v.as_bool()).unwrap_or(false),
                dirty: attr("dirty").and_then(|v| v.as_bool()).unwrap_or(false),
            },
        };
        Ok(event)
    }
}

impl From<&CareEvent> for CareEventRecord {
    fn from(event: &CareEvent) -> Self {
        let mut attributes = serde_json::Map::new();
        let end_time = match event {
            CareEvent::Feeding {
                end,
                method,
                amount_ml,
                side,
                ..
            } => {
                if let Some(m) = method {
                    attributes.insert("method".into(), serde_json::json!(m));
                }
                if let Some(a) = amount_ml {
                    attributes.insert("amount_ml".into(), serde_json::json!(a));
                }
                if let Some(s) = side {
                    attributes.insert("side".into(), serde_json::json!(s));
                }
                end.map(|e| e.to_rfc3339())
            }
            CareEvent::Sleep { end, location, .. } => {
                if let Some(l) = location {
                    attributes.insert("location".into(), serde_json::json!(l));
                }
                end.map(|e| e.to_rfc3339())
            }
            CareEvent::Diaper { wet, dirty, at, .. } => {
                attributes.insert("wet".into(), serde_json::json!(wet));
                attributes.insert("dirty".into(), serde_json::json!(dirty));
                Some(at.to_rfc3339())
            }
        };
        Self {
            id: event.id().to_string(),
            kind: event.kind().as_str().to_string(),
            start_time: event.start().to_rfc3339(),
            end_time,
            attributes: if attributes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::Object(attributes)
            },
        }
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Keep only feedings, sorted by start.
pub fn feedings_sorted(events: &[CareEvent]) -> Vec<&CareEvent> {
    let mut feedings: Vec<&CareEvent> = events
        .iter()
        .filter(|e| e.kind() == CareEventKind::Feeding)
        .collect();
    feedings.sort_by_key(|e| e.start());
    feedings
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_parses_feeding_attributes() {
        let record: CareEventRecord = serde_json::from_value(serde_json::json!({
            "id": "f1",
            "kind": "feeding",
            "start_time": "2026-03-01T08:00:00Z",
            "end_time": "2026-03-01T08:20:00+00:00",
            "attributes": { "method": "bottle", "amount_ml": 120 }
        }))
        .unwrap();

        match record.parse().unwrap() {
            CareEvent::Feeding {
                method,
                amount_ml,
                end,
                ..
            } => {
                assert_eq!(method, Some(FeedingMethod::Bottle));
                assert_eq!(amount_ml, Some(120));
                assert_eq!(end, Some(Utc.with_ymd_and_hms(2026, 3, 1, 8, 20, 0).unwrap()));
            }
            other => panic!("Expected feeding, got {other:?}"),
        }
    }

    #[test]
    fn record_rejects_end_before_start() {
        let record = CareEventRecord::new(
            "s1",
            CareEventKind::Sleep,
            "2026-03-01T08:00:00Z",
            Some("2026-03-01T07:00:00Z".into()),
        );
        assert!(matches!(
            record.parse(),
            Err(ValidationError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn record_rejects_bad_start() {
        let record = CareEventRecord::new("s1", CareEventKind::Sleep, "yesterday", None);
        assert!(record.start().is_none());
        assert!(matches!(
            record.parse(),
            Err(ValidationError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut record = CareEventRecord::new("x", CareEventKind::Sleep, "2026-03-01T08:00:00Z", None);
        record.kind = "bath".into();
        assert!(matches!(record.parse(), Err(ValidationError::UnknownKind(_))));
    }

    #[test]
    fn diaper_has_zero_duration() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let diaper = CareEvent::Diaper {
            id: "d1".into(),
            at,
            wet: true,
            dirty: false,
        };
        assert!(!diaper.is_open());
        assert_eq!(diaper.duration(), Some(Duration::zero()));
    }

    #[test]
    fn typed_event_converts_back_to_record() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap();
        let sleep = CareEvent::sleep("s1", start, None);
        let record = CareEventRecord::from(&sleep);
        assert_eq!(record.kind, "sleep");
        assert!(!record.has_end());
        assert_eq!(record.parse().unwrap(), sleep);
    }

    #[test]
    fn feedings_sorted_filters_and_orders() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let events = vec![
            CareEvent::feeding("b", t + Duration::hours(3)),
            CareEvent::sleep("s", t, None),
            CareEvent::feeding("a", t),
        ];
        let ids: Vec<&str> = feedings_sorted(&events).iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}

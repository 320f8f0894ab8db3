//! TOML-based engine configuration.
//!
//! Stores tuning knobs for:
//! - Partner activity polling cadence
//! - Reminder lead times and confidence gates
//! - The stale open-sleep ceiling
//! - The feeding night window
//!
//! Configuration is stored at `~/.config/cradle/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::clock::parse_clock_time;
use crate::error::ConfigError;
use crate::prediction::FeedingModel;

/// Partner activity polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Consecutive failed polls before subscribers are told connectivity is degraded.
    #[serde(default = "default_degraded_after")]
    pub degraded_after_failures: u32,
}

/// Reminder scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemindersConfig {
    #[serde(default = "default_sleep_lead")]
    pub sleep_lead_minutes: i64,
    #[serde(default = "default_sleep_min_confidence")]
    pub sleep_min_confidence: f64,
    #[serde(default = "default_feeding_lead")]
    pub feeding_lead_minutes: i64,
}

/// Stale open-sleep detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleConfig {
    #[serde(default = "default_max_open_sleep_hours")]
    pub max_open_sleep_hours: i64,
}

/// Feeding prediction night window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedingConfig {
    #[serde(default = "default_night_start")]
    pub night_start: String, // HH:MM
    #[serde(default = "default_night_end")]
    pub night_end: String, // HH:MM
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/cradle/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub reminders: RemindersConfig,
    #[serde(default)]
    pub stale: StaleConfig,
    #[serde(default)]
    pub feeding: FeedingConfig,
}

fn default_interval_secs() -> u64 {
    30
}
fn default_degraded_after() -> u32 {
    3
}
fn default_sleep_lead() -> i64 {
    15
}
fn default_sleep_min_confidence() -> f64 {
    0.6
}
fn default_feeding_lead() -> i64 {
    10
}
fn default_max_open_sleep_hours() -> i64 {
    24
}
fn default_night_start() -> String {
    "22:00".into()
}
fn default_night_end() -> String {
    "06:00".into()
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            degraded_after_failures: default_degraded_after(),
        }
    }
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            sleep_lead_minutes: default_sleep_lead(),
            sleep_min_confidence: default_sleep_min_confidence(),
            feeding_lead_minutes: default_feeding_lead(),
        }
    }
}

impl Default for StaleConfig {
    fn default() -> Self {
        Self {
            max_open_sleep_hours: default_max_open_sleep_hours(),
        }
    }
}

impl Default for FeedingConfig {
    fn default() -> Self {
        Self {
            night_start: default_night_start(),
            night_end: default_night_end(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
                let existing = obj
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<i64>() {
                            serde_json::Value::Number(n.into())
                        } else if let Ok(n) = value.parse::<f64>() {
                            serde_json::Number::from_f64(n)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as number")));
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Check values that serde cannot: clock strings and ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("feeding.night_start", &self.feeding.night_start),
            ("feeding.night_end", &self.feeding.night_end),
        ] {
            if parse_clock_time(value).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("'{value}' is not an HH:MM time"),
                });
            }
        }
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "polling.interval_secs".into(),
                message: "must be at least 1".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.reminders.sleep_min_confidence) {
            return Err(ConfigError::InvalidValue {
                key: "reminders.sleep_min_confidence".into(),
                message: "must be between 0 and 1".into(),
            });
        }
        for (key, value) in [
            ("reminders.sleep_lead_minutes", self.reminders.sleep_lead_minutes),
            ("reminders.feeding_lead_minutes", self.reminders.feeding_lead_minutes),
        ] {
            if value < 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "must not be negative".into(),
                });
            }
        }
        if self.stale.max_open_sleep_hours < 1 {
            return Err(ConfigError::InvalidValue {
                key: "stale.max_open_sleep_hours".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Load from the default location or create it with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without persisting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and persist to the default location.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("falling back to default config: {e}");
            Self::default()
        })
    }

    /// Feeding model with the configured night window.
    pub fn feeding_model(&self) -> FeedingModel {
        let defaults = FeedingModel::default();
        FeedingModel {
            night_start_minutes: parse_clock_time(&self.feeding.night_start)
                .unwrap_or(defaults.night_start_minutes),
            night_end_minutes: parse_clock_time(&self.feeding.night_end)
                .unwrap_or(defaults.night_end_minutes),
            ..defaults
        }
    }
}

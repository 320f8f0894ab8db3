mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, FeedingConfig, PollingConfig, RemindersConfig, StaleConfig};
pub use database::{Database, MemoryStore};

use std::path::PathBuf;

use crate::error::{ConfigError, CoreError};

/// Durable string key-value state.
///
/// Holds notification preferences, reminder schedule keys and the partner
/// activity marker. Access is single-key read-modify-write only.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), CoreError>;

    fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Returns `~/.config/cradle[-dev]/` based on CRADLE_ENV.
///
/// Set CRADLE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CRADLE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cradle-dev")
    } else {
        base_dir.join("cradle")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

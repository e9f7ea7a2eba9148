//! # Scheduler Configuration
//!
//! Operating parameters for the scheduler's background jobs and outbound
//! channels. Every field has a default, so an empty configuration is valid;
//! values come from an optional TOML file layered under `QUERYTASK_*`
//! environment overrides.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use querytask_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load_from_file("config/scheduler.toml")?;
//! let lease = manager.config().work_finder.lease();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::defaults;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SchedulerConfig {
    pub work_finder: WorkFinderConfig,
    pub cache_reload: CacheReloadConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

/// Periodic scan that turns query states into remote requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkFinderConfig {
    pub enabled: bool,
    pub trigger_interval_ms: u64,
    pub lease_ms: u64,
    /// Number of query ids remembered for CLOSE/CANCEL deduplication
    pub close_cancel_cache_size: usize,
    pub origin_service: String,
    pub destination_service: String,
}

impl Default for WorkFinderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_interval_ms: defaults::WORK_FINDER_TRIGGER_INTERVAL_MS,
            lease_ms: defaults::WORK_FINDER_LEASE_MS,
            close_cancel_cache_size: defaults::CLOSE_CANCEL_CACHE_SIZE,
            origin_service: defaults::ORIGIN_SERVICE.to_string(),
            destination_service: defaults::DESTINATION_SERVICE.to_string(),
        }
    }
}

impl WorkFinderConfig {
    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheReloadConfig {
    pub enabled: bool,
    pub trigger_interval_ms: u64,
    pub lease_ms: u64,
}

impl Default for CacheReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_interval_ms: defaults::CACHE_RELOAD_TRIGGER_INTERVAL_MS,
            lease_ms: defaults::CACHE_RELOAD_LEASE_MS,
        }
    }
}

impl CacheReloadConfig {
    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }

    pub fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub channel_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: defaults::NOTIFICATION_CHANNEL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; falls back to the environment default when unset
    pub level: Option<String>,
    pub json: bool,
}

impl SchedulerConfig {
    /// Reject values that would make a background job spin or never run
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("work_finder.trigger_interval_ms", self.work_finder.trigger_interval_ms),
            ("work_finder.lease_ms", self.work_finder.lease_ms),
            ("cache_reload.trigger_interval_ms", self.cache_reload.trigger_interval_ms),
            ("cache_reload.lease_ms", self.cache_reload.lease_ms),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.to_string(),
                    "must be greater than zero",
                ));
            }
        }

        if self.work_finder.close_cancel_cache_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "work_finder.close_cancel_cache_size",
                "0",
                "cache must hold at least one query id",
            ));
        }
        if self.notifications.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "notifications.channel_capacity",
                "0",
                "channel capacity must be greater than zero",
            ));
        }
        if self.work_finder.origin_service.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "work_finder.origin_service",
                "",
                "service name cannot be empty",
            ));
        }
        if self.work_finder.destination_service.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "work_finder.destination_service",
                "",
                "service name cannot be empty",
            ));
        }

        Ok(())
    }
}

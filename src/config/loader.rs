//! Configuration Loader
//!
//! Layers an optional TOML file under environment overrides and validates the
//! merged result. Environment keys use a single `_` after the prefix and `__`
//! between nested fields:
//!
//! ```text
//! QUERYTASK_WORK_FINDER__LEASE_MS=90000
//! QUERYTASK_LOGGING__JSON=true
//! ```

use super::error::{ConfigResult, ConfigurationError};
use super::SchedulerConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "QUERYTASK";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: SchedulerConfig,
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// Load a TOML file plus environment overrides.
    ///
    /// A missing file is not an error; the defaults apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        Self::load_layers(Some(path.as_ref()), ENV_PREFIX)
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: SchedulerConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            source: None,
        }))
    }

    fn load_layers(path: Option<&Path>, env_prefix: &str) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(
                ::config::File::from(path.to_path_buf())
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder.build().map_err(|e| match e {
            ::config::ConfigError::Foreign(inner) => {
                ConfigurationError::environment_override_error(env_prefix, inner)
            }
            other => ConfigurationError::from(other),
        })?;
        let config: SchedulerConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialization_error)?;

        config.validate()?;

        let manager = ConfigManager {
            config,
            source: path.map(Path::to_path_buf),
        };
        manager.log_summary();
        Ok(Arc::new(manager))
    }

    /// Emit the effective settings at info level.
    ///
    /// Loading happens before logging is configured, so callers that set up
    /// logging from this configuration call this again once it is installed.
    pub fn log_summary(&self) {
        let config = &self.config;
        info!(
            source = self.source.as_ref().map(|p| p.display().to_string()),
            work_finder_enabled = config.work_finder.enabled,
            work_finder_interval_ms = config.work_finder.trigger_interval_ms,
            work_finder_lease_ms = config.work_finder.lease_ms,
            cache_reload_enabled = config.cache_reload.enabled,
            cache_reload_interval_ms = config.cache_reload.trigger_interval_ms,
            log_json = config.logging.json,
            "Configuration loaded successfully"
        );
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let manager = ConfigManager::load_layers(
            Some(Path::new("/nonexistent/querytask.toml")),
            "QUERYTASK_TEST_MISSING",
        )
        .unwrap();
        assert_eq!(manager.config(), &SchedulerConfig::default());
    }

    #[test]
    fn test_file_values_override_defaults() {
        let file = toml_file(
            r#"
[work_finder]
trigger_interval_ms = 1000
lease_ms = 2500
origin_service = "scheduler-a"

[logging]
level = "warn"
json = true
"#,
        );

        let manager =
            ConfigManager::load_layers(Some(file.path()), "QUERYTASK_TEST_FILE").unwrap();
        let config = manager.config();
        assert_eq!(config.work_finder.trigger_interval_ms, 1000);
        assert_eq!(config.work_finder.lease_ms, 2500);
        assert_eq!(config.work_finder.origin_service, "scheduler-a");
        assert_eq!(config.logging.level.as_deref(), Some("warn"));
        assert!(config.logging.json);
        assert_eq!(manager.source(), Some(file.path()));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("[work_finder]\nlease_ms = 2500\n");
        std::env::set_var("QUERYTASK_TEST_ENV_WORK_FINDER__LEASE_MS", "7000");

        let manager =
            ConfigManager::load_layers(Some(file.path()), "QUERYTASK_TEST_ENV").unwrap();
        std::env::remove_var("QUERYTASK_TEST_ENV_WORK_FINDER__LEASE_MS");

        assert_eq!(manager.config().work_finder.lease_ms, 7000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = toml_file("[cache_reload]\nlease_ms = 0\n");
        let err = ConfigManager::load_layers(Some(file.path()), "QUERYTASK_TEST_INVALID")
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let file = toml_file("[work_finder\nlease_ms = ");
        assert!(
            ConfigManager::load_layers(Some(file.path()), "QUERYTASK_TEST_MALFORMED").is_err()
        );
    }

    #[test]
    fn test_from_config_validates() {
        let mut config = SchedulerConfig::default();
        assert!(ConfigManager::from_config(config.clone()).is_ok());

        config.notifications.channel_capacity = 0;
        assert!(ConfigManager::from_config(config).is_err());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_summary_can_be_replayed_after_logging_setup() {
        let file = toml_file("[work_finder]\nenabled = false\n");
        // Loaded with no subscriber installed, as the binary does
        let manager =
            ConfigManager::load_layers(Some(file.path()), "QUERYTASK_TEST_SUMMARY").unwrap();

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || manager.log_summary());

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        assert!(output.contains("Configuration loaded successfully"));
        assert!(output.contains("work_finder_enabled=false"));
        assert!(output.contains(&file.path().display().to_string()));
    }
}

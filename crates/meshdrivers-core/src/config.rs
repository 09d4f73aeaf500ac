/*!
 * Configuration management for meshdrivers.
 *
 * Settings are layered: built-in defaults, then an optional file, then
 * environment variables (`PREFIX__SECTION__KEY`).
 */
use std::path::Path;
use std::sync::Arc;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// General configuration
    #[serde(default)]
    pub general: GeneralConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Driver behaviour shared by every device
    #[serde(default)]
    pub drivers: DriversConfig,
}

/// General configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Application name
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Locale used to pick the display-string catalog
    #[serde(default = "default_locale")]
    pub locale: String,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (e.g. "info", "meshdrivers_devices=debug")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to include the event target in log lines
    #[serde(default = "default_true")]
    pub with_target: bool,
}

/// Driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriversConfig {
    /// Battery percentage strictly below which `alarm_battery` is raised
    #[serde(default = "default_battery_alarm_threshold")]
    pub battery_alarm_threshold: i64,

    /// Turn on debug diagnostics for every device regardless of driver
    #[serde(default)]
    pub force_debug: bool,

    /// Reporting parameters for the battery percentage attribute
    #[serde(default)]
    pub battery_report: ReportIntervals,
}

/// Attribute reporting parameters handed to the mesh unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportIntervals {
    /// Minimum interval between reports, in seconds
    pub min_interval: u16,
    /// Maximum interval between reports, in seconds
    pub max_interval: u16,
    /// Minimum change that triggers a report
    pub min_change: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            locale: default_locale(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: true,
        }
    }
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            battery_alarm_threshold: default_battery_alarm_threshold(),
            force_debug: false,
            battery_report: ReportIntervals::default(),
        }
    }
}

impl Default for ReportIntervals {
    fn default() -> Self {
        Self {
            min_interval: 10,
            max_interval: 60,
            min_change: 1,
        }
    }
}

fn default_app_name() -> String {
    "meshdrivers".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_battery_alarm_threshold() -> i64 {
    10
}

impl Config {
    /// Parse a configuration from TOML text, filling in defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::config(format!("Invalid TOML configuration: {}", e)))
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::serialization(format!("Failed to render configuration: {}", e)))
    }
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
    override_with: Option<Config>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Override with an existing config
    pub fn override_with(mut self, config: Config) -> Self {
        self.override_with = Some(config);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        if let Some(config) = self.override_with {
            return Ok(config);
        }

        let defaults = ConfigLib::try_from(&Config::default())
            .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?;
        let mut builder = ConfigLib::builder().add_source(defaults);

        if let Some(config_file) = self.config_file {
            if Path::new(&config_file).exists() {
                debug!("Loading configuration from {}", config_file);
                builder = builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            builder = builder.add_source(
                Environment::with_prefix(&prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        info!("Configuration loaded successfully");
        Ok(config)
    }
}

/// A thread-safe reference to a configuration
#[derive(Debug, Clone, Default)]
pub struct SharedConfig(Arc<Config>);

impl SharedConfig {
    /// Create a new SharedConfig
    pub fn new(config: Config) -> Self {
        Self(Arc::new(config))
    }

    /// Get a reference to the config
    pub fn get(&self) -> &Config {
        &self.0
    }
}

impl From<Config> for SharedConfig {
    fn from(config: Config) -> Self {
        Self::new(config)
    }
}

impl AsRef<Config> for SharedConfig {
    fn as_ref(&self) -> &Config {
        self.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.general.app_name, "meshdrivers");
        assert_eq!(config.general.locale, "en");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.drivers.battery_alarm_threshold, 10);
        assert!(!config.drivers.force_debug);
        assert_eq!(
            config.drivers.battery_report,
            ReportIntervals { min_interval: 10, max_interval: 60, min_change: 1 }
        );
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_builder_with_file() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meshdrivers.toml");
        fs::write(
            &file_path,
            br#"
                [general]
                locale = "nl"

                [drivers]
                battery_alarm_threshold = 20
                force_debug = true
            "#,
        )?;

        let config = ConfigBuilder::new().with_config_file(&file_path).build()?;

        assert_eq!(config.general.locale, "nl");
        assert_eq!(config.general.app_name, "meshdrivers");
        assert_eq!(config.drivers.battery_alarm_threshold, 20);
        assert!(config.drivers.force_debug);
        assert_eq!(config.drivers.battery_report.max_interval, 60);
        Ok(())
    }

    #[test]
    fn test_config_builder_missing_file_uses_defaults() -> Result<()> {
        let config = ConfigBuilder::new()
            .with_config_file("/nonexistent/meshdrivers.toml")
            .build()?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_config_builder_with_env() -> Result<()> {
        env::set_var("MESHDRIVERS_TEST__LOGGING__LEVEL", "trace");
        env::set_var("MESHDRIVERS_TEST__DRIVERS__BATTERY_ALARM_THRESHOLD", "15");

        let config = ConfigBuilder::new()
            .with_environment_prefix("MESHDRIVERS_TEST")
            .build()?;

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.drivers.battery_alarm_threshold, 15);

        env::remove_var("MESHDRIVERS_TEST__LOGGING__LEVEL");
        env::remove_var("MESHDRIVERS_TEST__DRIVERS__BATTERY_ALARM_THRESHOLD");
        Ok(())
    }

    #[test]
    fn test_override_wins() -> Result<()> {
        let mut custom = Config::default();
        custom.drivers.force_debug = true;
        let config = ConfigBuilder::new().override_with(custom.clone()).build()?;
        assert_eq!(config, custom);
        Ok(())
    }

    #[test]
    fn test_toml_roundtrip_keeps_defaults() -> Result<()> {
        let config = Config::from_toml_str("[drivers]\nbattery_alarm_threshold = 5\n")?;
        assert_eq!(config.drivers.battery_alarm_threshold, 5);
        assert_eq!(config.drivers.battery_report, ReportIntervals::default());

        let text = config.to_toml_string()?;
        assert_eq!(Config::from_toml_str(&text)?, config);
        Ok(())
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(Config::from_toml_str("[drivers"), Err(Error::Config(_))));
    }

    #[test]
    fn test_shared_config() {
        let shared = SharedConfig::new(Config::default());
        let cloned = shared.clone();
        assert_eq!(cloned.get().general.app_name, "meshdrivers");
        assert_eq!(shared.as_ref().drivers.battery_alarm_threshold, 10);
    }
}

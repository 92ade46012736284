//! Configuration management for the server kit host.
//!
//! One TOML file holds the host's own tables (`[host]`, `[logging]`) and one
//! table per function. Host tables are read here; every other table is handed
//! to the [`SettingsSource`](server_kit::SettingsSource) untouched.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::functions::greeter::GreeterSettings;

fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

fn default_command_timeout() -> u64 {
    10_000
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host runtime settings
    #[serde(default)]
    pub host: HostSettings,
    /// Logging configuration settings
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Function sections, keyed by section name
    #[serde(flatten)]
    pub functions: toml::Table,
}

/// Host runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSettings {
    /// Interval at which the owning thread drains its queue
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// How long a caller waits for the owning thread to run a command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
    /// Sender name attached to messages sent by functions
    #[serde(default)]
    pub server_name: Option<String>,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            command_timeout_ms: default_command_timeout(),
            server_name: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut functions = toml::Table::new();
        if let Ok(toml::Value::Table(greeter)) = toml::Value::try_from(GreeterSettings::default()) {
            functions.insert(
                <GreeterSettings as server_kit::Settings>::SECTION.to_string(),
                toml::Value::Table(greeter),
            );
        }
        Self {
            host: HostSettings::default(),
            logging: LoggingSettings::default(),
            functions,
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Parses configuration from TOML text; missing tables take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The function tables as a standalone TOML document.
    pub fn functions_document(&self) -> Result<String> {
        Ok(toml::to_string(&self.functions)?)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.host.tick_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.host.command_timeout_ms)
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.host.tick_interval_ms == 0 {
            bail!("Tick interval must be greater than zero");
        }
        if self.host.command_timeout_ms == 0 {
            bail!("Command timeout must be greater than zero");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            );
        }

        if let Some((name, _)) = self.functions.iter().find(|(_, value)| !value.is_table()) {
            bail!("Function section '{name}' must be a table");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.host.tick_interval_ms, 50);
        assert_eq!(config.host.command_timeout_ms, 10_000);
        assert!(config.host.server_name.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert!(config.functions.contains_key("greeter"));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server-kit.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.host.tick_interval_ms, 50);
        assert!(path.exists());

        // The written file loads back to the same thing.
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.host.command_timeout_ms, config.host.command_timeout_ms);
        assert_eq!(reloaded.functions, config.functions);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[host]
tick_interval_ms = 33
command_timeout_ms = 2500
server_name = "Wasteland"

[logging]
level = "debug"
json_format = true

[greeter]
is_enabled = false
trigger = "/hi"
"#;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server-kit.toml");
        tokio::fs::write(&path, toml_content).await.unwrap();

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.host.tick_interval_ms, 33);
        assert_eq!(config.command_timeout(), Duration::from_millis(2500));
        assert_eq!(config.host.server_name.as_deref(), Some("Wasteland"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);

        let document = config.functions_document().unwrap();
        let greeter: GreeterSettings = server_kit::SettingsSource::parse_section(&document).unwrap();
        assert!(!greeter.is_enabled);
        assert_eq!(greeter.trigger, "/hi");
    }

    #[test]
    fn test_serde_deserialization_with_defaults() {
        let config = AppConfig::from_toml("[logging]\nlevel = \"warn\"\n").unwrap();
        assert_eq!(config.host.tick_interval_ms, 50);
        assert_eq!(config.host.command_timeout_ms, 10_000);
        assert!(config.functions.is_empty());

        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_zero_intervals() {
        let mut config = AppConfig::default();
        config.host.tick_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Tick interval"));

        let mut config = AppConfig::default();
        config.host.command_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_log_levels() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let mut config = AppConfig::default();
            config.logging.level = level.to_string();
            assert!(config.validate().is_ok(), "Level '{}' should be valid", level);
        }

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_validation_rejects_non_table_function_section() {
        let config = AppConfig::from_toml("greeter = true\n").unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("greeter"));
    }
}

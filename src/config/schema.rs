//! Configuration schema definitions.
//!
//! This module defines the configuration structure every service built on the
//! kit understands. All types derive Serde traits for deserialization from
//! config files, and every field has a default so an empty file is valid.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;

/// Root configuration loaded at startup.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct KitConfig {
    /// Log output settings.
    pub logger: LoggerConfig,

    /// Span exporter settings (used when tracing is enabled).
    pub tracing: TracingConfig,

    /// Metrics exporter settings.
    pub metrics: MetricsConfig,

    /// Service-specific tables the kit does not interpret.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl KitConfig {
    /// Deserialize a service-specific top-level table into `T`.
    ///
    /// Only tables the kit does not own are reachable here; `logger`,
    /// `tracing` and `metrics` are already parsed into their typed fields.
    pub fn section<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self
            .extra
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::MissingSection(key.to_string()))?;
        value.try_into().map_err(ConfigError::Parse)
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum level (debug, info, warn, error, fatal).
    pub level: String,

    /// Directory for the log file. Empty disables file output.
    pub path: String,

    /// Log file name inside `path`.
    pub filename: String,

    /// File rotation policy.
    pub rotation: LogRotation,

    /// Also write to stdout.
    pub stdout: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: String::new(),
            filename: "service.log".to_string(),
            rotation: LogRotation::Never,
            stdout: true,
        }
    }
}

impl LoggerConfig {
    /// Whether a log file should be written.
    pub fn file_enabled(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Rotation policy for file output.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    Daily,
    #[default]
    Never,
}

/// Span exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TracingConfig {
    /// Directory for exported spans.
    pub path: String,

    /// File name for exported spans.
    pub filename: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            path: "logs".to_string(),
            filename: "spans.log".to_string(),
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus scrape endpoint.
    pub enabled: bool,

    /// Scrape endpoint bind address.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0:9090".to_string(),
        }
    }
}

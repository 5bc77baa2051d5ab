//! Configuration loading from disk.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::KitConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::environment::Environment;

/// Name of the config file inside `configs/<env>/`.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Config section `{0}` not found")]
    MissingSection(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<KitConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<KitConfig, ConfigError> {
    let config: KitConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load the configuration for a runtime environment.
///
/// Reads `<project_root>/configs/<env>/config.toml`. In debug the file must
/// exist; elsewhere a missing file falls back to defaults.
pub fn load_for(env: &Environment) -> Result<KitConfig, ConfigError> {
    let path = env.config_dir().join(CONFIG_FILE_NAME);
    match load_config(&path) {
        Err(ConfigError::Io { source, .. })
            if source.kind() == ErrorKind::NotFound && !env.runtime.is_debug() =>
        {
            tracing::warn!(path = %path.display(), "No config file found, using defaults");
            Ok(KitConfig::default())
        }
        other => other,
    }
}

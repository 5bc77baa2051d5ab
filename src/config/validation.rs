//! Configuration validation.
//!
//! Serde handles the syntax; this checks values that deserialize fine but
//! cannot work at runtime. All problems are reported, not just the first.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::KitConfig;

/// A single semantic problem in a loaded config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a config, collecting every problem found.
pub fn validate_config(config: &KitConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.logger.file_enabled() && config.logger.filename.trim().is_empty() {
        errors.push(ValidationError {
            field: "logger.filename",
            message: "must not be empty when logger.path is set".to_string(),
        });
    }

    if config.tracing.filename.trim().is_empty() {
        errors.push(ValidationError {
            field: "tracing.filename",
            message: "must not be empty".to_string(),
        });
    }

    if config.metrics.enabled && config.metrics.address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "metrics.address",
            message: format!("`{}` is not a socket address", config.metrics.address),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

//! Fatal startup errors.

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::observability::logging::LoggingError;

/// Errors that abort service initialization.
///
/// None of these are recoverable: the caller is expected to report the error
/// and exit.
#[derive(Debug, Error)]
pub enum KitError {
    /// The project root could not be resolved.
    #[error("failed to resolve environment: {0}")]
    Environment(#[source] std::io::Error),

    /// Configuration could not be read, parsed or validated.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The global subscriber could not be installed.
    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    /// The metrics exporter could not be installed.
    #[error("metrics error: {0}")]
    Metrics(String),

    /// Subscribing to termination signals failed.
    #[error("failed to install {signal} handler: {source}")]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for kit initialization.
pub type KitResult<T> = Result<T, KitError>;

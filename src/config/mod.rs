//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! configs/<env>/config.toml
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → KitConfig (validated, immutable)
//!     → store.rs (published process-wide via Arc)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Service-specific tables are kept raw and scanned on demand

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;

pub use loader::{load_config, load_for, ConfigError};
pub use schema::{KitConfig, LogRotation, LoggerConfig, MetricsConfig, TracingConfig};

//! Bootstrapping kit for backend services.
//!
//! One call wires up what every service needs before it does real work:
//! environment detection, configuration, structured logging, optional span
//! export and metrics, and a graceful shutdown coordinator that runs cleanup
//! hooks when the process receives a termination signal.
//!
//! ```no_run
//! use service_kit::{init, KitOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let kit = init(
//!         "orders",
//!         KitOptions::new()
//!             .with_tracing()
//!             .on_shutdown("db", |_ctx| async { Ok(()) }),
//!     )?;
//!
//!     // serve traffic...
//!
//!     kit.finish().await
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::KitConfig;
pub use error::{KitError, KitResult};
pub use lifecycle::{init, Kit, KitOptions, ShutdownCoordinator, ShutdownHandle};

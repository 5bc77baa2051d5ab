//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Kit and service code produce:
//!     → logging.rs (JSON log lines, stdout + rolling file)
//!     → tracing.rs (closed spans, optional)
//!     → metrics.rs (shutdown counters and histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, file)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every log line carries the service name
//! - File writers are non-blocking; spans are flushed by a shutdown hook,
//!   logs after the drain
//! - Span export is opt-in

pub mod logging;
pub mod metrics;
pub mod tracing;

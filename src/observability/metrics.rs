//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus exporter, labelled with the service name
//! - Record shutdown hook outcomes and drain duration
//!
//! # Metrics
//! - `kit_shutdown_hooks_total` (counter): hooks run, by `outcome`
//!   (completed, failed, timed_out, panicked)
//! - `kit_shutdown_drain_seconds` (histogram): wall time of the drain
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op, so the coordinator
//!   records unconditionally
//! - The `service` label is global, set once at install time

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::{KitError, KitResult};

pub const SHUTDOWN_HOOKS_TOTAL: &str = "kit_shutdown_hooks_total";
pub const SHUTDOWN_DRAIN_SECONDS: &str = "kit_shutdown_drain_seconds";

/// Install the Prometheus exporter and its scrape endpoint.
///
/// Must run inside a Tokio runtime; the HTTP listener is spawned on it.
pub fn init(config: &MetricsConfig, service_name: &str) -> KitResult<()> {
    let addr: SocketAddr = config
        .address
        .parse()
        .map_err(|e| KitError::Metrics(format!("invalid address {}: {e}", config.address)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label("service", service_name)
        .install()
        .map_err(|e| KitError::Metrics(e.to_string()))?;

    describe();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe() {
    describe_counter!(SHUTDOWN_HOOKS_TOTAL, "Shutdown hooks run, by outcome");
    describe_histogram!(
        SHUTDOWN_DRAIN_SECONDS,
        Unit::Seconds,
        "Time spent running shutdown hooks"
    );
}

/// Count one finished shutdown hook.
pub fn record_hook_outcome(outcome: &'static str) {
    counter!(SHUTDOWN_HOOKS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record how long a drain took.
pub fn record_drain_duration(elapsed: Duration) {
    histogram!(SHUTDOWN_DRAIN_SECONDS).record(elapsed.as_secs_f64());
}

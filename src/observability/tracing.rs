//! Span export.
//!
//! # Responsibilities
//! - Record every closed span (path, ids, fields, busy/idle time) as a JSON line
//! - Hand a flush hook to the shutdown coordinator
//!
//! # Design Decisions
//! - Optional: only installed when the service enables tracing
//! - Only spans are exported; plain events stay in the log output
//! - Writes go through a non-blocking writer, flushed on shutdown
//! - Lines use the log formatter, so `span_id` matches the ids on log lines

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt::format::{FmtSpan, JsonFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::config::TracingConfig;
use crate::environment::Environment;
use crate::lifecycle::shutdown::{HookResult, ShutdownContext};
use crate::observability::logging::{build_appender, JsonFormatter, LoggingError};

/// Writer side of the span exporter, turned into a subscriber layer.
pub struct SpanExporter {
    writer: NonBlocking,
    service: String,
}

/// Flush side of the span exporter, registered as a shutdown hook.
#[must_use = "dropping the flush handle stops span export"]
pub struct SpanFlush {
    guard: WorkerGuard,
}

impl SpanExporter {
    /// Open the span file under `config.path` (resolved against the project root).
    pub fn new(
        config: &TracingConfig,
        env: &Environment,
    ) -> Result<(Self, SpanFlush), LoggingError> {
        let appender = build_appender(
            env.resolve(&config.path),
            &config.filename,
            Rotation::NEVER,
        )?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let exporter = Self {
            writer,
            service: env.service_name.clone(),
        };
        Ok((exporter, SpanFlush { guard }))
    }

    pub fn into_layer<S>(self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
    {
        Box::new(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(self.writer)
                .with_span_events(FmtSpan::CLOSE)
                .fmt_fields(JsonFields::new())
                .event_format(JsonFormatter::new(&self.service))
                .with_filter(filter_fn(|meta| meta.is_span())),
        )
    }
}

impl SpanFlush {
    /// Flush exported spans to disk.
    pub async fn flush(self, _ctx: ShutdownContext) -> HookResult {
        let guard = self.guard;
        tokio::task::spawn_blocking(move || drop(guard)).await?;
        Ok(())
    }
}

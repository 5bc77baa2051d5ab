//! Structured logging.
//!
//! # Responsibilities
//! - Install the process-wide `tracing` subscriber
//! - Emit one JSON object per event to stdout and/or a rolling file
//! - Stamp every line with the service name
//!
//! # Design Decisions
//! - Level comes from config; `RUST_LOG` overrides it when set
//! - File output goes through a non-blocking writer; its guard is flushed by
//!   [`Kit::finish`](crate::Kit::finish) after the drain so drain logs reach disk
//! - Lines inside a span carry its registry id and its parent's, the same ids
//!   the span exporter writes
//!
//! Line shape:
//! ```text
//! {"time":"...","level":"INFO","service":"orders","target":"orders::db",
//!  "spans":["checkout","charge"],"span_id":7,"parent_span_id":3,
//!  "span":{"card":"visa"},"body":"connected","pool":8}
//! ```

use std::fmt;
use std::io;
use std::path::PathBuf;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, JsonFields, Writer};
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormattedFields, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{LogRotation, LoggerConfig};
use crate::environment::Environment;
use crate::lifecycle::shutdown::HookResult;
use crate::observability::tracing::SpanExporter;

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),

    #[error("failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open log file in {path}: {source}")]
    Appender {
        path: PathBuf,
        #[source]
        source: InitError,
    },
}

/// Map a configured level name to a filter. Unknown names mean `info`.
pub fn parse_level(level: &str) -> LevelFilter {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        // No fatal level in tracing.
        "error" | "fatal" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Keeps buffered file output alive until flushed.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    file: Option<WorkerGuard>,
}

impl fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogGuard")
            .field("file", &self.file.is_some())
            .finish()
    }
}

impl LogGuard {
    /// Flush buffered file output. Runs on the blocking pool since the writer
    /// thread is joined synchronously.
    pub async fn flush(self) -> HookResult {
        if let Some(guard) = self.file {
            tokio::task::spawn_blocking(move || drop(guard)).await?;
        }
        Ok(())
    }
}

/// Install the global subscriber.
///
/// `spans` adds the span exporter layer when tracing is enabled. Can only
/// succeed once per process.
pub fn init(
    config: &LoggerConfig,
    env: &Environment,
    spans: Option<SpanExporter>,
) -> Result<LogGuard, LoggingError> {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(&config.level).into())
        .from_env_lossy();

    let stdout_layer = config
        .stdout
        .then(|| json_layer(io::stdout, &env.service_name));

    let (file_layer, file_guard) = if config.file_enabled() {
        let appender = build_appender(
            env.resolve(&config.path),
            &config.filename,
            rotation(config.rotation),
        )?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(json_layer(writer, &env.service_name)), Some(guard))
    } else {
        (None, None)
    };

    let span_layer = spans.map(SpanExporter::into_layer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .with(span_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LogGuard { file: file_guard })
}

/// A fmt layer writing [`JsonFormatter`] lines to `writer`.
pub fn json_layer<S, W>(writer: W, service: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + Send + Sync,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    Box::new(
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .fmt_fields(JsonFields::new())
            .event_format(JsonFormatter::new(service)),
    )
}

pub(crate) fn build_appender(
    dir: PathBuf,
    filename: &str,
    rotation: Rotation,
) -> Result<RollingFileAppender, LoggingError> {
    if let Err(source) = std::fs::create_dir_all(&dir) {
        return Err(LoggingError::Directory { path: dir, source });
    }
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(filename)
        .build(&dir)
        .map_err(|source| LoggingError::Appender { path: dir, source })
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Minutely => Rotation::MINUTELY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Never => Rotation::NEVER,
    }
}

/// Formats events as single-line JSON objects.
///
/// The message goes under `body`; other event fields sit at the top level
/// unless they collide with a reserved key. Inside a span the line also
/// carries the span path, the innermost span's id, its parent's id and, when
/// the layer formats span fields with [`JsonFields`], those fields under `span`.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    service: String,
}

impl JsonFormatter {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();

        let mut time = String::new();
        SystemTime.format_time(&mut Writer::new(&mut time))?;

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);

        let mut line = Map::new();
        line.insert("time".into(), Value::String(time));
        line.insert("level".into(), Value::String(meta.level().to_string()));
        line.insert("service".into(), Value::String(self.service.clone()));
        line.insert("target".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope() {
            // Leaf first.
            let spans: Vec<_> = scope.collect();
            let path = spans
                .iter()
                .rev()
                .map(|span| Value::String(span.name().to_string()))
                .collect();
            line.insert("spans".into(), Value::Array(path));

            if let Some(leaf) = spans.first() {
                line.insert("span_id".into(), leaf.id().into_u64().into());
                if let Some(parent) = leaf.parent() {
                    line.insert("parent_span_id".into(), parent.id().into_u64().into());
                }
                let extensions = leaf.extensions();
                let fields = extensions
                    .get::<FormattedFields<N>>()
                    .and_then(|formatted| serde_json::from_str::<Value>(&formatted.fields).ok());
                if let Some(fields @ Value::Object(_)) = fields {
                    line.insert("span".into(), fields);
                }
            }
        }

        line.insert(
            "body".into(),
            Value::String(visitor.message.unwrap_or_default()),
        );
        for (key, value) in visitor.fields {
            line.entry(key).or_insert(value);
        }

        writeln!(writer, "{}", Value::Object(line))
    }
}

#[derive(Default)]
struct JsonVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl JsonVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for JsonVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_string()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        let number = serde_json::Number::from_f64(value).map_or(Value::Null, Value::Number);
        self.insert(field, number);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, Value::String(value.to_string()));
    }
}

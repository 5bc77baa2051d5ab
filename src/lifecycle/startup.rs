//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve the environment and stamp the service identity
//! - Load and publish configuration
//! - Install logging, metrics and the optional span exporter
//! - Register shutdown hooks and start the coordinator
//!
//! # Design Decisions
//! - Fail fast: config, logging, metrics and signal errors are fatal
//! - A span exporter that cannot open its file is logged and skipped
//! - The log writer is not a shutdown hook. [`Kit::finish`] flushes it once
//!   the drain is done, so the drain is logged in full even when a hook panics

use std::future::Future;
use std::sync::Arc;

use crate::config::{self, KitConfig};
use crate::environment::{self, Environment};
use crate::error::{KitError, KitResult};
use crate::lifecycle::shutdown::{
    HookResult, ShutdownContext, ShutdownCoordinator, ShutdownHandle, ShutdownHook, ShutdownPolicy,
};
use crate::observability::logging::{self, LogGuard};
use crate::observability::{metrics, tracing::SpanExporter};

/// Recognized startup options.
#[derive(Debug, Default)]
pub struct KitOptions {
    /// Export closed spans and flush them on shutdown.
    pub tracing_enabled: bool,
    /// How the drain treats failing, slow or panicking hooks.
    pub shutdown: ShutdownPolicy,
    hooks: Vec<ShutdownHook>,
}

impl KitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracing(mut self) -> Self {
        self.tracing_enabled = true;
        self
    }

    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown = policy;
        self
    }

    /// Run `hook` on shutdown, after the span flush.
    pub fn on_shutdown<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: FnOnce(ShutdownContext) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.hooks.push(ShutdownHook::named(name, hook));
        self
    }
}

/// An initialized service: environment, config and a running shutdown coordinator.
#[derive(Debug)]
pub struct Kit {
    environment: Environment,
    config: Arc<KitConfig>,
    shutdown: ShutdownHandle,
    log_guard: LogGuard,
}

impl Kit {
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    /// Wait until a termination signal has been received and every shutdown
    /// hook has run.
    pub async fn wait(&self) {
        self.shutdown.wait().await
    }

    /// Wait for the drain, then flush buffered file logs. The process should
    /// exit afterwards; file output logged later is dropped.
    pub async fn finish(self) -> HookResult {
        self.shutdown.wait().await;
        self.log_guard.flush().await
    }
}

/// Bootstrap a service.
///
/// Must be called once, inside a Tokio runtime.
pub fn init(service_name: &str, options: KitOptions) -> KitResult<Kit> {
    let environment = Environment::detect(service_name).map_err(KitError::Environment)?;
    environment::set_service_name(&environment.service_name);

    let config = Arc::new(config::load_for(&environment)?);
    config::store::publish(config.clone());

    let (span_layer, span_flush, span_error) = if options.tracing_enabled {
        match SpanExporter::new(&config.tracing, &environment) {
            Ok((exporter, flush)) => (Some(exporter), Some(flush), None),
            Err(e) => (None, None, Some(e)),
        }
    } else {
        (None, None, None)
    };

    let log_guard = logging::init(&config.logger, &environment, span_layer)?;
    tracing::info!(
        service = %environment.service_name,
        env = %environment.runtime,
        level = %config.logger.level,
        "Logging initialized"
    );

    if config.metrics.enabled {
        metrics::init(&config.metrics, &environment.service_name)?;
    }

    let mut coordinator = ShutdownCoordinator::with_policy(options.shutdown);

    if let Some(error) = span_error {
        tracing::error!(%error, "Failed to init span exporter, continuing without it");
    }
    if let Some(flush) = span_flush {
        coordinator.register_named("tracing", move |ctx| flush.flush(ctx));
        tracing::info!(path = %config.tracing.path, "Span export enabled");
    }

    for hook in options.hooks {
        coordinator.push(hook);
    }

    let hooks = coordinator.len();
    let shutdown = coordinator.start()?;
    tracing::info!(hooks, "Waiting for termination signal");

    Ok(Kit {
        environment,
        config,
        shutdown,
        log_guard,
    })
}

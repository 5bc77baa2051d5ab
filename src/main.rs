//! kit-demo: a minimal service built on the kit.
//!
//! Boots with the given options, then idles until SIGHUP, SIGINT, SIGTERM or
//! SIGQUIT arrives, runs the shutdown hooks and exits.
//!
//! ```text
//! APP_ENV=prod kit-demo --service-name orders --tracing --hook-timeout-secs 5
//! ```

use std::time::Duration;

use clap::Parser;
use service_kit::lifecycle::{PanicIsolation, ShutdownPolicy};
use service_kit::{init, KitOptions};

#[derive(Parser)]
#[command(name = "kit-demo")]
#[command(about = "Demo service for the bootstrapping kit", long_about = None)]
struct Cli {
    /// Service name stamped into every log line
    #[arg(short, long, default_value = "kit-demo")]
    service_name: String,

    /// Export closed spans to the configured tracing file
    #[arg(long)]
    tracing: bool,

    /// Abandon a shutdown hook after this many seconds
    #[arg(long)]
    hook_timeout_secs: Option<u64>,

    /// Keep draining after a hook panics
    #[arg(long)]
    isolate_panics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let policy = ShutdownPolicy {
        isolation: if cli.isolate_panics {
            PanicIsolation::PerHook
        } else {
            PanicIsolation::WholeDrain
        },
        hook_timeout: cli.hook_timeout_secs.map(Duration::from_secs),
    };

    let mut options = KitOptions::new()
        .with_shutdown_policy(policy)
        .on_shutdown("demo", |_ctx| async {
            tracing::info!("Demo hook releasing resources");
            Ok(())
        });
    if cli.tracing {
        options = options.with_tracing();
    }

    let kit = init(&cli.service_name, options)?;

    let span = tracing::info_span!("startup", env = %kit.environment().runtime);
    span.in_scope(|| tracing::info!("kit-demo ready"));
    drop(span);

    kit.wait().await;
    tracing::info!("Shutdown complete");
    kit.finish().await
}

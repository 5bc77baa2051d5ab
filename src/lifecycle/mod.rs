//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve env → Load config → Logging → Metrics → Options → Start coordinator
//!
//! Signals (signals.rs):
//!     SIGHUP/SIGINT/SIGTERM/SIGQUIT → first one starts the drain
//!
//! Shutdown (shutdown.rs):
//!     Drain hooks in registration order → Done → caller exits
//! ```
//!
//! # Design Decisions
//! - Ordered startup: environment first, then config, then observability
//! - Ordered shutdown: hooks run one at a time, in the order registered
//! - Exactly one drain per process; later signals are ignored

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{
    DrainState, HookError, HookResult, PanicIsolation, ShutdownContext, ShutdownCoordinator,
    ShutdownHandle, ShutdownHook, ShutdownPolicy, ShutdownReason,
};
pub use signals::TerminationSignal;
pub use startup::{init, Kit, KitOptions};

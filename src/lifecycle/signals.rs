//! OS signal handling.
//!
//! # Responsibilities
//! - Subscribe to SIGHUP, SIGINT, SIGTERM and SIGQUIT
//! - Resolve with whichever arrives first
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Subscriptions are installed eagerly by [`TerminationSignals::install`] so
//!   a signal raised right after startup is never missed
//! - Non-unix targets only see Ctrl-C

use std::fmt;

use crate::error::KitResult;

/// A termination request delivered by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationSignal {
    Hangup,
    Interrupt,
    Terminate,
    Quit,
}

impl TerminationSignal {
    /// Conventional signal name, e.g. `SIGTERM`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hangup => "SIGHUP",
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
            Self::Quit => "SIGQUIT",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Installed subscriptions to every termination signal.
#[cfg(unix)]
pub struct TerminationSignals {
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    /// Subscribe to all termination signals. Must run inside a Tokio runtime.
    pub fn install() -> KitResult<Self> {
        use tokio::signal::unix::SignalKind;

        Ok(Self {
            hangup: subscribe(SignalKind::hangup(), TerminationSignal::Hangup)?,
            interrupt: subscribe(SignalKind::interrupt(), TerminationSignal::Interrupt)?,
            terminate: subscribe(SignalKind::terminate(), TerminationSignal::Terminate)?,
            quit: subscribe(SignalKind::quit(), TerminationSignal::Quit)?,
        })
    }

    /// Wait for the first termination signal.
    pub async fn recv(mut self) -> TerminationSignal {
        tokio::select! {
            Some(()) = self.hangup.recv() => TerminationSignal::Hangup,
            Some(()) = self.interrupt.recv() => TerminationSignal::Interrupt,
            Some(()) = self.terminate.recv() => TerminationSignal::Terminate,
            Some(()) = self.quit.recv() => TerminationSignal::Quit,
            else => std::future::pending().await,
        }
    }
}

#[cfg(unix)]
fn subscribe(
    kind: tokio::signal::unix::SignalKind,
    signal: TerminationSignal,
) -> KitResult<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(kind).map_err(|source| crate::error::KitError::Signal {
        signal: signal.name(),
        source,
    })
}

/// Installed subscriptions to every termination signal.
#[cfg(not(unix))]
pub struct TerminationSignals {
    _private: (),
}

#[cfg(not(unix))]
impl TerminationSignals {
    pub fn install() -> KitResult<Self> {
        Ok(Self { _private: () })
    }

    pub async fn recv(self) -> TerminationSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => TerminationSignal::Interrupt,
            Err(error) => {
                tracing::error!(%error, "failed to receive Ctrl-C");
                std::future::pending().await
            }
        }
    }
}

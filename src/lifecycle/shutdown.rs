//! Shutdown coordination.
//!
//! The coordinator owns an ordered registry of shutdown hooks. Once started it
//! waits on a background task for the first termination signal (or a manual
//! trigger), then drains: every hook runs once, in registration order, one at
//! a time. Hook errors are logged and the drain moves on. Panics are caught
//! and logged; where the boundary sits is chosen by [`PanicIsolation`].
//!
//! ```text
//! ShutdownCoordinator (idle)  ──start()──▶  Waiting ──signal──▶ Draining ──▶ Done
//! ```
//!
//! `start` consumes the coordinator, so the registry cannot change once the
//! wait has begun. The coordinator never exits the process; the caller does
//! that after [`ShutdownHandle::wait`] returns.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

use crate::error::KitResult;
use crate::lifecycle::signals::{TerminationSignal, TerminationSignals};
use crate::observability::metrics;

/// Error returned by a failing shutdown hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a shutdown hook.
pub type HookResult = Result<(), HookError>;

type HookFuture = Pin<Box<dyn Future<Output = HookResult> + Send>>;
type HookFn = Box<dyn FnOnce(ShutdownContext) -> HookFuture + Send>;

/// Cancellation context handed to each shutdown hook.
///
/// Without a per-hook timeout this is a background context: it is never
/// cancelled and has no deadline. With one, the token is cancelled once the
/// hook overruns.
#[derive(Debug, Clone)]
pub struct ShutdownContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ShutdownContext {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// When the coordinator stops waiting for this hook, if ever.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the coordinator has abandoned this hook.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the hook has been abandoned.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Token for handing cancellation to work the hook spawns.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Where panics raised during a drain are caught.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicIsolation {
    /// One boundary around the whole drain. A panic in hook `i` is logged and
    /// hooks `i+1..` are skipped.
    #[default]
    WholeDrain,
    /// A boundary around each hook. The drain continues past a panic.
    PerHook,
}

/// How a drain treats misbehaving hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownPolicy {
    pub isolation: PanicIsolation,
    /// Abandon a hook that runs longer than this. `None` waits forever.
    pub hook_timeout: Option<Duration>,
}

/// Observable progress of a started coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// Subscribed to termination signals, no drain yet.
    Waiting,
    /// Hooks are running.
    Draining,
    /// Every hook has been attempted. Terminal.
    Done,
}

/// What started the drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(TerminationSignal),
    /// [`ShutdownHandle::trigger`] was called.
    Manual,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(signal) => write!(f, "{signal}"),
            Self::Manual => f.write_str("manual trigger"),
        }
    }
}

/// A registered shutdown hook.
pub struct ShutdownHook {
    name: Option<String>,
    run: HookFn,
}

impl ShutdownHook {
    /// An unnamed hook, labelled by its index in logs.
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: FnOnce(ShutdownContext) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self {
            name: None,
            run: Box::new(move |ctx| Box::pin(hook(ctx))),
        }
    }

    /// A hook labelled `name` in logs.
    pub fn named<F, Fut>(name: impl Into<String>, hook: F) -> Self
    where
        F: FnOnce(ShutdownContext) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(hook)
        }
    }

    fn label(&self, index: usize) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{index}"),
        }
    }
}

impl fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHook")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Coordinator for graceful shutdown.
#[derive(Default)]
pub struct ShutdownCoordinator {
    hooks: Vec<ShutdownHook>,
    policy: ShutdownPolicy,
    dispatch: Option<Dispatch>,
}

impl ShutdownCoordinator {
    /// Create a coordinator with no hooks and the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator with no hooks and the given policy.
    pub fn with_policy(policy: ShutdownPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Log drain progress to `dispatch` instead of the global subscriber.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Append a hook. Hooks run in the order they were registered.
    pub fn register<F, Fut>(&mut self, hook: F)
    where
        F: FnOnce(ShutdownContext) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.push(ShutdownHook::new(hook));
    }

    /// Append a hook with a name used in log output.
    pub fn register_named<F, Fut>(&mut self, name: impl Into<String>, hook: F)
    where
        F: FnOnce(ShutdownContext) -> Fut + Send + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        self.push(ShutdownHook::named(name, hook));
    }

    /// Append an already built hook.
    pub fn push(&mut self, hook: ShutdownHook) {
        self.hooks.push(hook);
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no hook is registered yet.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Subscribe to termination signals and wait for one in the background.
    ///
    /// Returns as soon as the subscriptions are installed. Must be called
    /// inside a Tokio runtime.
    pub fn start(self) -> KitResult<ShutdownHandle> {
        let signals = TerminationSignals::install()?;
        Ok(self.start_on(signals.recv().map(ShutdownReason::Signal)))
    }

    /// Wait in the background for `trigger` instead of OS signals.
    ///
    /// [`ShutdownHandle::trigger`] still works alongside it.
    pub fn start_on<F>(self, trigger: F) -> ShutdownHandle
    where
        F: Future<Output = ShutdownReason> + Send + 'static,
    {
        let (manual_tx, manual_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(DrainState::Waiting);

        let Self {
            hooks,
            policy,
            dispatch,
        } = self;

        let task = async move {
            let reason = tokio::select! {
                reason = trigger => reason,
                Ok(()) = manual_rx => ShutdownReason::Manual,
            };
            state_tx.send_replace(DrainState::Draining);
            drain(hooks, policy, reason).await;
            state_tx.send_replace(DrainState::Done);
        };

        let _detached = match dispatch {
            Some(dispatch) => tokio::spawn(task.with_subscriber(dispatch)),
            None => tokio::spawn(task),
        };

        ShutdownHandle {
            manual: Mutex::new(Some(manual_tx)),
            state: state_rx,
        }
    }
}

impl fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("hooks", &self.hooks)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Handle to a started coordinator.
#[derive(Debug)]
pub struct ShutdownHandle {
    manual: Mutex<Option<oneshot::Sender<()>>>,
    state: watch::Receiver<DrainState>,
}

impl ShutdownHandle {
    /// Start the drain without an OS signal.
    ///
    /// Returns `true` if this call started it. Later calls, and calls after a
    /// signal already started the drain, do nothing and return `false`.
    pub fn trigger(&self) -> bool {
        let sender = match self.manual.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        sender.is_some_and(|tx| tx.send(()).is_ok())
    }

    /// Current drain state.
    pub fn state(&self) -> DrainState {
        *self.state.borrow()
    }

    /// Wait until every hook has been attempted.
    pub async fn wait(&self) {
        let mut state = self.state.clone();
        // Err means the task is gone (runtime shutting down); nothing left to wait for.
        let _ = state.wait_for(|s| *s == DrainState::Done).await;
    }
}

enum HookOutcome {
    Completed,
    Failed(HookError),
    TimedOut(Duration),
    Panicked(String),
}

impl HookOutcome {
    fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
            Self::Panicked(_) => "panicked",
        }
    }
}

async fn drain(hooks: Vec<ShutdownHook>, policy: ShutdownPolicy, reason: ShutdownReason) {
    tracing::info!(%reason, hooks = hooks.len(), "Received signal, starting shutdown");
    let started = Instant::now();

    match policy.isolation {
        PanicIsolation::PerHook => run_hooks(hooks, policy).await,
        PanicIsolation::WholeDrain => {
            if let Err(payload) = AssertUnwindSafe(run_hooks(hooks, policy))
                .catch_unwind()
                .await
            {
                metrics::record_hook_outcome("panicked");
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    "Shutdown panicked, remaining hooks skipped"
                );
            }
        }
    }

    let elapsed = started.elapsed();
    metrics::record_drain_duration(elapsed);
    tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "Shutdown sequence finished");
}

async fn run_hooks(hooks: Vec<ShutdownHook>, policy: ShutdownPolicy) {
    for (index, hook) in hooks.into_iter().enumerate() {
        let name = hook.label(index);
        tracing::info!(index, hook = %name, "Running shutdown hook");

        let outcome = match policy.isolation {
            PanicIsolation::WholeDrain => run_hook(hook, policy.hook_timeout).await,
            PanicIsolation::PerHook => {
                match AssertUnwindSafe(run_hook(hook, policy.hook_timeout))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(payload) => HookOutcome::Panicked(panic_message(payload.as_ref())),
                }
            }
        };

        metrics::record_hook_outcome(outcome.label());
        match outcome {
            HookOutcome::Completed => {}
            HookOutcome::Failed(error) => {
                tracing::error!(index, hook = %name, %error, "Shutdown hook failed");
            }
            HookOutcome::TimedOut(limit) => {
                tracing::warn!(
                    index,
                    hook = %name,
                    timeout_ms = limit.as_millis() as u64,
                    "Shutdown hook timed out, abandoning it"
                );
            }
            HookOutcome::Panicked(panic) => {
                tracing::error!(index, hook = %name, %panic, "Shutdown hook panicked");
            }
        }
    }
}

async fn run_hook(hook: ShutdownHook, timeout: Option<Duration>) -> HookOutcome {
    let ctx = ShutdownContext::with_timeout(timeout);
    let fut = (hook.run)(ctx.clone());

    let result = match timeout {
        None => fut.await,
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                ctx.token.cancel();
                return HookOutcome::TimedOut(limit);
            }
        },
    };

    match result {
        Ok(()) => HookOutcome::Completed,
        Err(error) => HookOutcome::Failed(error),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    fn recorder(
        calls: &Calls,
        name: &'static str,
    ) -> impl FnOnce(ShutdownContext) -> HookFuture {
        let calls = calls.clone();
        move |_ctx| {
            Box::pin(async move {
                calls.lock().unwrap().push(name);
                Ok(())
            })
        }
    }

    fn idle() -> impl Future<Output = ShutdownReason> {
        std::future::pending()
    }

    fn explode() -> HookResult {
        panic!("hook exploded")
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let calls = Calls::default();
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(recorder(&calls, "a"));
        coordinator.register(recorder(&calls, "b"));
        coordinator.register(recorder(&calls, "c"));
        assert_eq!(coordinator.len(), 3);

        let handle = coordinator.start_on(idle());
        assert_eq!(handle.state(), DrainState::Waiting);
        assert!(calls.lock().unwrap().is_empty());

        assert!(handle.trigger());
        handle.wait().await;

        assert_eq!(handle.state(), DrainState::Done);
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_error_does_not_stop_drain() {
        let calls = Calls::default();
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(recorder(&calls, "a"));
        let c = calls.clone();
        coordinator.register_named("flaky", move |_| async move {
            c.lock().unwrap().push("b");
            Err::<(), HookError>("exporter unreachable".into())
        });
        coordinator.register(recorder(&calls, "c"));

        let handle = coordinator.start_on(idle());
        handle.trigger();
        handle.wait().await;

        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_whole_drain_panic_skips_rest() {
        let calls = Calls::default();
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(recorder(&calls, "a"));
        coordinator.register(|_| async move { explode() });
        coordinator.register(recorder(&calls, "c"));

        let handle = coordinator.start_on(idle());
        handle.trigger();
        handle.wait().await;

        assert_eq!(handle.state(), DrainState::Done);
        assert_eq!(*calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_per_hook_panic_continues() {
        let calls = Calls::default();
        let mut coordinator = ShutdownCoordinator::with_policy(ShutdownPolicy {
            isolation: PanicIsolation::PerHook,
            hook_timeout: None,
        });
        coordinator.register(recorder(&calls, "a"));
        coordinator.register(|_| -> HookFuture { panic!("panicked before returning a future") });
        coordinator.register(recorder(&calls, "c"));

        let handle = coordinator.start_on(idle());
        handle.trigger();
        handle.wait().await;

        assert_eq!(*calls.lock().unwrap(), vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_abandons_hook_and_cancels_context() {
        let calls = Calls::default();
        let (ctx_tx, ctx_rx) = oneshot::channel();
        let mut coordinator = ShutdownCoordinator::with_policy(ShutdownPolicy {
            isolation: PanicIsolation::WholeDrain,
            hook_timeout: Some(Duration::from_secs(5)),
        });
        coordinator.register_named("stuck", move |ctx: ShutdownContext| async move {
            assert!(ctx.deadline().is_some());
            let _ = ctx_tx.send(ctx);
            std::future::pending::<()>().await;
            Ok(())
        });
        coordinator.register(recorder(&calls, "after"));

        let handle = coordinator.start_on(idle());
        handle.trigger();
        handle.wait().await;

        assert_eq!(*calls.lock().unwrap(), vec!["after"]);
        let ctx = ctx_rx.await.unwrap();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_default_context_is_background() {
        let (ctx_tx, ctx_rx) = oneshot::channel();
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(move |ctx| async move {
            let _ = ctx_tx.send(ctx);
            Ok(())
        });

        let handle = coordinator.start_on(idle());
        handle.trigger();
        handle.wait().await;

        let ctx = ctx_rx.await.unwrap();
        assert!(ctx.deadline().is_none());
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_second_trigger_is_inert() {
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let mut coordinator = ShutdownCoordinator::new();
        let r = runs.clone();
        coordinator.register(move |_| async move {
            r.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(())
        });

        let handle = coordinator.start_on(idle());
        assert!(handle.trigger());
        assert!(!handle.trigger());
        handle.wait().await;
        assert!(!handle.trigger());

        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_external_trigger_wins_and_disarms_manual() {
        let calls = Calls::default();
        let mut coordinator = ShutdownCoordinator::new();
        coordinator.register(recorder(&calls, "a"));

        let handle = coordinator
            .start_on(async { ShutdownReason::Signal(TerminationSignal::Terminate) });
        handle.wait().await;

        assert!(!handle.trigger());
        assert_eq!(*calls.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_empty_registry_drains() {
        let coordinator = ShutdownCoordinator::new();
        assert!(coordinator.is_empty());

        let handle = coordinator.start_on(idle());
        handle.trigger();
        handle.wait().await;
        assert_eq!(handle.state(), DrainState::Done);
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(42u32);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(
            ShutdownReason::Signal(TerminationSignal::Quit).to_string(),
            "SIGQUIT"
        );
        assert_eq!(ShutdownReason::Manual.to_string(), "manual trigger");
    }
}

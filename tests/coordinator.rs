//! Shutdown coordinator behavior as seen from a service.

use std::time::Duration;

use service_kit::lifecycle::{
    DrainState, HookError, PanicIsolation, ShutdownCoordinator, ShutdownPolicy, ShutdownReason,
};

mod common;

use common::{CaptureWriter, Calls};

fn never() -> std::future::Pending<ShutdownReason> {
    std::future::pending()
}

#[tokio::test]
async fn test_drain_logs_start_index_and_errors() {
    let logs = CaptureWriter::default();
    let calls = Calls::default();

    let mut coordinator = ShutdownCoordinator::new().with_dispatch(logs.dispatch());
    coordinator.register_named("exporter", calls.hook("exporter"));
    let c = calls.clone();
    coordinator.register_named("database", move |_| async move {
        c.push("database");
        Err::<(), HookError>("connection reset".into())
    });
    coordinator.register(calls.hook("cache"));

    let handle = coordinator.start_on(never());
    handle.trigger();
    handle.wait().await;

    assert_eq!(calls.snapshot(), vec!["exporter", "database", "cache"]);

    let output = logs.contents();
    assert!(output.contains("Received signal, starting shutdown"));
    assert!(output.contains("reason=manual trigger"));
    assert!(output.contains("hook=exporter"));
    assert!(output.contains("hook=#2"));
    assert!(output.contains("Shutdown hook failed"));
    assert!(output.contains("connection reset"));
    assert!(output.contains("Shutdown sequence finished"));
}

#[tokio::test]
async fn test_empty_registry_logs_and_completes() {
    let logs = CaptureWriter::default();
    let handle = ShutdownCoordinator::new()
        .with_dispatch(logs.dispatch())
        .start_on(never());

    handle.trigger();
    handle.wait().await;

    assert_eq!(handle.state(), DrainState::Done);
    let output = logs.contents();
    assert!(output.contains("Received signal, starting shutdown"));
    assert!(output.contains("hooks=0"));
    assert!(!output.contains("ERROR"));
}

#[tokio::test]
async fn test_panic_is_logged_not_propagated() {
    let logs = CaptureWriter::default();
    let calls = Calls::default();

    let mut coordinator = ShutdownCoordinator::new().with_dispatch(logs.dispatch());
    coordinator.register(calls.hook("before"));
    coordinator.register_named("broken", |_| async {
        let values: Vec<u32> = Vec::new();
        let _value = values[3];
        Ok(())
    });
    coordinator.register(calls.hook("after"));

    let handle = coordinator.start_on(never());
    handle.trigger();
    handle.wait().await;

    assert_eq!(handle.state(), DrainState::Done);
    assert_eq!(calls.snapshot(), vec!["before"]);
    let output = logs.contents();
    assert!(output.contains("Shutdown panicked, remaining hooks skipped"));
    assert!(output.contains("index out of bounds"));
}

#[tokio::test]
async fn test_per_hook_isolation_logs_each_panic() {
    let logs = CaptureWriter::default();
    let calls = Calls::default();

    let mut coordinator = ShutdownCoordinator::with_policy(ShutdownPolicy {
        isolation: PanicIsolation::PerHook,
        hook_timeout: None,
    })
    .with_dispatch(logs.dispatch());
    coordinator.register_named("first", |_| async {
        let values: Vec<u32> = Vec::new();
        let _value = values[0];
        Ok(())
    });
    coordinator.register(calls.hook("second"));

    let handle = coordinator.start_on(never());
    handle.trigger();
    handle.wait().await;

    assert_eq!(calls.snapshot(), vec!["second"]);
    assert!(logs.contents().contains("Shutdown hook panicked"));
}

#[tokio::test]
async fn test_registration_before_start_is_fully_drained() {
    let calls = Calls::default();
    let mut coordinator = ShutdownCoordinator::new();

    // Registration interleaved with other setup work.
    coordinator.register(calls.hook("one"));
    tokio::time::sleep(Duration::from_millis(5)).await;
    coordinator.register(calls.hook("two"));
    for name in ["three", "four", "five"] {
        coordinator.register(calls.hook(name));
    }

    let handle = coordinator.start_on(async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ShutdownReason::Manual
    });
    assert_eq!(handle.state(), DrainState::Waiting);
    handle.wait().await;

    assert_eq!(calls.snapshot(), vec!["one", "two", "three", "four", "five"]);
}

#[tokio::test]
async fn test_slow_hook_blocks_next_until_it_finishes() {
    let calls = Calls::default();
    let mut coordinator = ShutdownCoordinator::new();

    let c = calls.clone();
    coordinator.register(move |_| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        c.push("slow");
        Ok(())
    });
    coordinator.register(calls.hook("next"));

    let handle = coordinator.start_on(never());
    handle.trigger();
    handle.wait().await;

    assert_eq!(calls.snapshot(), vec!["slow", "next"]);
}

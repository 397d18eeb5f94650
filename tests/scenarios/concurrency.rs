//! Test: Concurrency - isolated runs, timeouts and cancellation

use crate::helpers::*;
use buildgate::core::{RunStatus, StepError, TimeoutCause, TriggerEvent};
use buildgate::execution::Dispatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let actions = Arc::new(
        MockActions::new()
            .delayed("cargo build", Duration::from_millis(50))
            .writing_coverage("llvm-cov", "lcov.info", LCOV),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let engine = Arc::new(engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "cov")]),
        &actions,
        &reporter,
    ));

    let mut dispatcher = Dispatcher::new(engine, CancellationToken::new());
    assert!(dispatcher.dispatch(TriggerEvent::push("main")));
    assert!(dispatcher.dispatch(TriggerEvent::pull_request("main")));
    assert!(!dispatcher.dispatch(TriggerEvent::push("develop")));
    assert_eq!(dispatcher.in_flight(), 2);

    let runs = dispatcher.join_all().await;
    assert_eq!(runs.len(), 2);

    let results: Vec<_> = runs.into_iter().map(|r| r.outcome.unwrap()).collect();
    assert!(results.iter().all(|r| r.status == RunStatus::Succeeded));
    assert_ne!(results[0].run_id, results[1].run_id);
    assert_eq!(reporter.uploads().len(), 2);

    // One checkout per run, each into its own workspace, removed afterwards
    let checkouts: Vec<_> = actions
        .calls()
        .into_iter()
        .filter(|c| c.command == "checkout")
        .collect();
    assert_eq!(checkouts.len(), 2);
    assert_ne!(checkouts[0].workdir, checkouts[1].workdir);
    assert!(checkouts.iter().all(|c| !c.workdir.exists()));
}

#[tokio::test]
async fn test_step_timeout() {
    let yaml = r#"
name: "Slow"
on:
  push: {}
steps:
  - id: build
    build: cargo build
    timeout_secs: 1
  - id: test
    test: cargo test
"#;
    let actions = Arc::new(MockActions::new().delayed("cargo build", Duration::from_secs(120)));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    assert_eq!(
        *assert_step_failed(&result, "build"),
        StepError::Timeout(TimeoutCause::Elapsed { secs: 1 })
    );
    assert_step_skipped(&result, "test", "step 'build' failed");
}

/// Cancelling the dispatcher stops in-flight work but still reports
#[tokio::test]
async fn test_cancel_reaches_in_flight_runs() {
    let actions = Arc::new(MockActions::new().delayed("cargo build", Duration::from_secs(120)));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = Arc::new(engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "cov")]),
        &actions,
        &reporter,
    ));

    let cancel = CancellationToken::new();
    let mut dispatcher = Dispatcher::new(engine, cancel.clone());
    assert!(dispatcher.dispatch(TriggerEvent::push("main")));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let runs = tokio::time::timeout(Duration::from_secs(10), dispatcher.join_all())
        .await
        .expect("cancelled runs should finish promptly");
    let result = runs.into_iter().next().unwrap().outcome.unwrap();

    assert_run_status(&result, RunStatus::Failed);
    assert_eq!(
        *assert_step_failed(&result, "build"),
        StepError::Timeout(TimeoutCause::Cancelled)
    );
    assert_step_skipped(&result, "test", "step 'build' failed");
    assert_eq!(reporter.uploads().len(), 1);
    assert_eq!(reporter.uploads()[0].status, RunStatus::Failed);
}

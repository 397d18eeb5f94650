//! Test: Trigger Filtering - only matching events start a run

use crate::helpers::*;
use buildgate::core::{RunStatus, TriggerEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A pull request into a branch outside the filter provisions nothing
#[tokio::test]
async fn test_non_matching_event_runs_nothing() {
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "cov-token")]),
        &actions,
        &reporter,
    );

    let outcome = engine
        .dispatch(&TriggerEvent::pull_request("develop"), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_none());
    assert!(actions.calls().is_empty());
    assert!(reporter.uploads().is_empty());
}

/// Rejection happens before secrets are looked up
#[tokio::test]
async fn test_non_matching_event_ignores_missing_secret() {
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(RUST_PIPELINE, secrets(&[]), &actions, &reporter);

    let outcome = engine
        .dispatch(&TriggerEvent::push("feature/login"), &CancellationToken::new())
        .await;

    assert!(matches!(outcome, Ok(None)));
}

/// Each event kind is filtered by its own branch list
#[tokio::test]
async fn test_branch_filters_are_per_event_kind() {
    let yaml = r#"
name: "Release"
on:
  push:
    branches: ["main", { pattern: "^release/.+$", regex: true }]
  pull_request: {}
steps:
  - id: build
    build: cargo build --release
"#;
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[]), &actions, &reporter);
    let cancel = CancellationToken::new();

    let release = engine
        .dispatch(&TriggerEvent::push("release/1.2"), &cancel)
        .await
        .unwrap()
        .expect("release branch should trigger");
    assert_run_status(&release, RunStatus::Succeeded);

    assert!(engine
        .dispatch(&TriggerEvent::push("feature/x"), &cancel)
        .await
        .unwrap()
        .is_none());

    // No branch list on pull_request accepts every target
    assert!(engine
        .dispatch(&TriggerEvent::pull_request("feature/x"), &cancel)
        .await
        .unwrap()
        .is_some());

    assert_eq!(actions.commands().len(), 2);
}

//! Test: Failure Handling - fail-fast steps and the report step that always runs

use crate::helpers::*;
use buildgate::core::{RunStatus, StepError, TriggerEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A failing test step skips what follows but the report still goes out once
#[tokio::test]
async fn test_test_failure_still_reports_once() {
    let yaml = r#"
name: "Rust"
on:
  push:
    branches: ["main"]
steps:
  - id: checkout
    checkout: {}
  - id: build
    build: cargo build
  - id: test
    test: cargo test
    coverage: lcov.info
  - id: docs
    build: cargo doc
  - id: codecov
    report:
      token: { secret: CODECOV_TOKEN }
"#;
    let actions = Arc::new(
        MockActions::new()
            .writing_coverage("cargo test", "lcov.info", LCOV)
            .failing("cargo test", 101, "test result: FAILED. 3 passed; 1 failed"),
    );
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[("CODECOV_TOKEN", "cov")]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    assert_eq!(result.failed_step.as_deref(), Some("test"));
    assert_step_succeeded(&result, "checkout");
    assert_step_succeeded(&result, "build");
    assert_eq!(
        *assert_step_failed(&result, "test"),
        StepError::NonZeroExit { code: Some(101) }
    );
    assert_step_skipped(&result, "docs", "step 'test' failed");
    assert_eq!(actions.commands(), vec!["checkout", "cargo build", "cargo test"]);

    // Coverage left behind by a failing test run is still reported
    assert!(result.coverage().is_some());
    let uploads = reporter.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, RunStatus::Failed);
    assert_eq!(uploads[0].artifact_len, LCOV.len());
    assert!(!result.report_degraded());
}

#[tokio::test]
async fn test_checkout_failure() {
    let actions = Arc::new(MockActions::new().failing_checkout("unknown ref 'main'"));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "cov")]),
        &actions,
        &reporter,
    );

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    match assert_step_failed(&result, "checkout") {
        StepError::Checkout(message) => assert!(message.contains("unknown ref")),
        other => panic!("expected a checkout error, got {:?}", other),
    }
    assert_step_skipped(&result, "build", "step 'checkout' failed");
    assert_step_skipped(&result, "test", "step 'checkout' failed");
    assert!(result.coverage().is_none());

    // Metadata-only upload
    let uploads = reporter.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].artifact, None);
}

/// Without a report step nothing is uploaded and `report` stays empty
#[tokio::test]
async fn test_failure_without_report_step() {
    let yaml = r#"
name: "Lint"
on:
  push: {}
steps:
  - id: fmt
    build: cargo fmt --check
  - id: clippy
    build: cargo clippy
"#;
    let actions = Arc::new(MockActions::new().failing("fmt", 1, "Diff in src/lib.rs"));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    assert_step_skipped(&result, "clippy", "step 'fmt' failed");
    assert!(result.report.is_none());
    assert!(reporter.uploads().is_empty());
}

/// Tests read the database URL from a secret and fail; the report still runs
#[tokio::test]
async fn test_database_tests_fail_on_push_to_main() {
    let yaml = r#"
name: "Rust"
on:
  push:
    branches: ["main"]
steps:
  - id: checkout
    checkout: {}
  - id: build
    build: cargo build --verbose
  - id: test
    test: cargo test --verbose
    env:
      DATABASE_URL: { secret: DATABASE_URL }
  - id: coverage
    report:
      token: { secret: CODECOV_TOKEN }
"#;
    let actions = Arc::new(MockActions::new().failing("cargo test", 101, "connection refused"));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(
        yaml,
        secrets(&[
            ("DATABASE_URL", "postgres://ci:pw@localhost/app"),
            ("CODECOV_TOKEN", "cov"),
        ]),
        &actions,
        &reporter,
    );

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    let order: Vec<&str> = result.steps.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(order, vec!["checkout", "build", "test"]);
    assert_step_succeeded(&result, "checkout");
    assert_step_succeeded(&result, "build");
    assert_step_failed(&result, "test");

    assert_eq!(
        actions.call("cargo test --verbose").env("DATABASE_URL"),
        Some("postgres://ci:pw@localhost/app")
    );
    assert_eq!(actions.call("cargo build --verbose").env("DATABASE_URL"), None);

    assert_eq!(reporter.uploads().len(), 1);
    assert_eq!(reporter.uploads()[0].token, "cov");
    assert!(result.report.is_some());
}

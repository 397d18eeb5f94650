//! Test: Reporting - integration failures never change the build verdict

use crate::helpers::*;
use buildgate::core::{ReportOutcome, RunStatus, TriggerEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_rejected_upload_keeps_success() {
    let actions = Arc::new(MockActions::new().writing_coverage("llvm-cov", "lcov.info", LCOV));
    let reporter = Arc::new(RecordingReporter::rejecting(401, "invalid token s3cr3t"));
    let engine = engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "s3cr3t")]),
        &actions,
        &reporter,
    );

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Succeeded);
    assert_eq!(reporter.uploads().len(), 1);
    match &result.report {
        Some(ReportOutcome::Degraded { reason }) => {
            assert!(reason.contains("401"), "reason: {}", reason);
            assert!(!reason.contains("s3cr3t"), "reason leaks the token: {}", reason);
        }
        other => panic!("expected a degraded report, got {:?}", other),
    }
}

/// A missing coverage file degrades the report instead of failing the run
#[tokio::test]
async fn test_missing_coverage_file_uploads_metadata() {
    let actions = Arc::new(MockActions::new());
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

    assert_run_status(&result, RunStatus::Succeeded);
    assert!(result.coverage().is_none());
    assert_eq!(result.report, Some(ReportOutcome::Delivered { uploaded_bytes: 0 }));
    assert_eq!(reporter.uploads()[0].artifact, None);
}

/// A report step placed before the tests sees the run still in progress
#[tokio::test]
async fn test_report_before_tests_sees_running_status() {
    let yaml = r#"
name: "Early report"
on:
  push: {}
steps:
  - id: build
    build: cargo build
  - id: codecov
    report:
      token: { secret: CODECOV_TOKEN }
  - id: test
    test: cargo test
"#;
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[("CODECOV_TOKEN", "cov")]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Succeeded);
    assert_step_succeeded(&result, "test");
    assert!(result.step("codecov").is_none());

    let uploads = reporter.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, RunStatus::Running);
}

/// A report step ahead of a failing test still runs exactly once
#[tokio::test]
async fn test_report_before_failing_tests_runs_once() {
    let yaml = r#"
name: "Early report"
on:
  push: {}
steps:
  - id: build
    build: cargo build
  - id: codecov
    report:
      token: { secret: CODECOV_TOKEN }
  - id: test
    test: cargo test
"#;
    let actions = Arc::new(MockActions::new().failing("cargo test", 101, "1 failed"));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[("CODECOV_TOKEN", "cov")]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    assert_eq!(result.failed_step.as_deref(), Some("test"));
    assert_step_succeeded(&result, "build");
    assert_step_failed(&result, "test");
    assert!(result.report.is_some());

    let uploads = reporter.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, RunStatus::Running);
}

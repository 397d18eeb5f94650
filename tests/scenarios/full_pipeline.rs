//! Test: Full Pipeline - checkout, build, test and report in order

use crate::helpers::*;
use buildgate::core::{ReportOutcome, RunStatus, TriggerEvent};
use buildgate::execution::ExecutionEvent;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_push_to_main() {
    let actions = Arc::new(MockActions::new().writing_coverage("llvm-cov", "lcov.info", LCOV));
    let reporter = Arc::new(RecordingReporter::new());
    let mut engine = engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "cov-token")]),
        &actions,
        &reporter,
    );

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Succeeded);
    assert_eq!(result.pipeline_name, "Rust");
    assert!(result.failed_step.is_none());
    assert!(result.finished_at.is_some());

    let order: Vec<&str> = result.steps.iter().map(|r| r.step_id.as_str()).collect();
    assert_eq!(order, vec!["checkout", "build", "test"]);
    assert_eq!(
        actions.commands(),
        vec![
            "checkout",
            "cargo build --verbose",
            "cargo llvm-cov --lcov --output-path lcov.info"
        ]
    );
    assert_eq!(actions.call("cargo build --verbose").env("CARGO_TERM_COLOR"), Some("always"));

    let coverage = result.coverage().expect("coverage artifact");
    assert_eq!(coverage.step_id, "test");
    assert_eq!(coverage.size_bytes, LCOV.len() as u64);
    assert_eq!(
        result.report,
        Some(ReportOutcome::Delivered {
            uploaded_bytes: LCOV.len()
        })
    );

    let uploads = reporter.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].status, RunStatus::Succeeded);
    assert_eq!(uploads[0].branch, "main");
    assert_eq!(uploads[0].token, "cov-token");
    assert_eq!(uploads[0].flags, vec!["unittests".to_string()]);
    assert_eq!(uploads[0].artifact.as_deref(), Some("lcov.info"));

    let events = events.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(ExecutionEvent::RunStarted { total_steps: 4, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(ExecutionEvent::RunFinished {
            status: RunStatus::Succeeded,
            ..
        })
    ));
}

#[tokio::test]
async fn test_pull_request_into_main() {
    let actions = Arc::new(MockActions::new().writing_coverage("llvm-cov", "lcov.info", LCOV));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(
        RUST_PIPELINE,
        secrets(&[("CODECOV_TOKEN", "cov-token")]),
        &actions,
        &reporter,
    );

    let event = TriggerEvent::pull_request("main").with_commit("9b1d3e7");
    let result = engine
        .dispatch(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Succeeded);
    assert_eq!(result.event, event);
    assert_eq!(
        actions.call("cargo build --verbose").env("BUILDGATE_EVENT"),
        Some("pull_request")
    );
    assert_eq!(reporter.uploads().len(), 1);
}

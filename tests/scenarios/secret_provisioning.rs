//! Test: Secret Provisioning - missing secrets abort before any step

use crate::helpers::*;
use buildgate::core::{ProvisionError, RunStatus, TriggerEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_missing_secret_aborts_run() {
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(RUST_PIPELINE, secrets(&[]), &actions, &reporter);

    let outcome = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await;

    match outcome {
        Err(ProvisionError::MissingSecret(name)) => assert_eq!(name, "CODECOV_TOKEN"),
        other => panic!("expected a missing secret, got {:?}", other),
    }
    assert!(actions.calls().is_empty());
    assert!(reporter.uploads().is_empty());
}

/// Secrets reach the process environment but never the recorded output
#[tokio::test]
async fn test_secret_values_are_masked_in_output() {
    let yaml = r#"
name: "Deploy"
on:
  push: {}
env:
  DEPLOY_KEY: { secret: DEPLOY_KEY }
steps:
  - id: deploy
    build: ./deploy.sh
"#;
    let actions = Arc::new(MockActions::new().failing(
        "deploy.sh",
        2,
        "auth failed for key hunter2-key",
    ));
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[("DEPLOY_KEY", "hunter2-key")]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Failed);
    assert_eq!(
        actions.call("./deploy.sh").env("DEPLOY_KEY"),
        Some("hunter2-key")
    );

    let output = &result.step("deploy").unwrap().output;
    assert!(output.contains("auth failed for key ***"), "output: {}", output);
    assert!(!output.contains("hunter2-key"));

    let json = serde_json::to_string(&result).unwrap();
    assert!(!json.contains("hunter2-key"));
}

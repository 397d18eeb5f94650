//! Test: Environment Scoping - step overrides stay with their step

use crate::helpers::*;
use buildgate::core::{RunStatus, TriggerEvent};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_step_override_does_not_leak() {
    let yaml = r#"
name: "Env"
on:
  push: {}
env:
  RUST_LOG: info
  CARGO_TERM_COLOR: always
steps:
  - id: first
    build: cargo build
  - id: second
    test: cargo test
    env:
      RUST_LOG: debug
      RUST_BACKTRACE: "1"
  - id: third
    build: cargo doc
"#;
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[]), &actions, &reporter);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_run_status(&result, RunStatus::Succeeded);

    let first = actions.call("cargo build");
    let second = actions.call("cargo test");
    let third = actions.call("cargo doc");

    assert_eq!(first.env("RUST_LOG"), Some("info"));
    assert_eq!(second.env("RUST_LOG"), Some("debug"));
    assert_eq!(second.env("RUST_BACKTRACE"), Some("1"));
    assert_eq!(second.env("CARGO_TERM_COLOR"), Some("always"));
    assert_eq!(third.env("RUST_LOG"), Some("info"));
    assert_eq!(third.env("RUST_BACKTRACE"), None);
}

#[tokio::test]
async fn test_builtin_variables() {
    let yaml = r#"
name: "Env"
on:
  push: {}
steps:
  - id: build
    build: make
"#;
    let actions = Arc::new(MockActions::new());
    let reporter = Arc::new(RecordingReporter::new());
    let engine = engine(yaml, secrets(&[]), &actions, &reporter);

    let event = TriggerEvent::push("main").with_commit("4f2a9c1");
    let result = engine
        .dispatch(&event, &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    let call = actions.call("make");
    let run_id = result.run_id.to_string();
    assert_eq!(call.env("CI"), Some("true"));
    assert_eq!(call.env("BUILDGATE_RUN_ID"), Some(run_id.as_str()));
    assert_eq!(call.env("BUILDGATE_EVENT"), Some("push"));
    assert_eq!(call.env("BUILDGATE_BRANCH"), Some("main"));
    assert_eq!(call.env("BUILDGATE_COMMIT"), Some("4f2a9c1"));
    assert_eq!(
        call.env("BUILDGATE_WORKSPACE").map(std::path::PathBuf::from),
        Some(call.workdir.clone())
    );
}

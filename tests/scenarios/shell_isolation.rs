//! Test: Shell Isolation - real child processes see only what the run gives them

use crate::helpers::*;
use buildgate::core::{RunStatus, StepError, TimeoutCause, TriggerEvent};
use buildgate::execution::PipelineEngine;
use buildgate::secrets::EnvSecretStore;
use buildgate::{ShellActionRunner, ShellConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn shell_engine(yaml: &str) -> PipelineEngine<ShellActionRunner, Arc<RecordingReporter>> {
    PipelineEngine::new(
        definition_from_yaml(yaml),
        Arc::new(EnvSecretStore::new()),
        ShellActionRunner::new(ShellConfig::default()),
        Arc::new(RecordingReporter::new()),
    )
}

/// A secret living in the host environment reaches only the step declaring it
#[tokio::test]
async fn test_host_secret_reaches_only_declaring_step() {
    std::env::set_var("BUILDGATE_SCENARIO_DATABASE_URL", "postgres://ci:pw@db/app");
    let yaml = r#"
name: "Isolation"
on:
  push: {}
steps:
  - id: build
    build: echo "build sees:${BUILDGATE_SCENARIO_DATABASE_URL:+ host}${DATABASE_URL:+ declared}"
  - id: test
    test: echo "test sees:${DATABASE_URL:+ declared}"
    env:
      DATABASE_URL: { secret: BUILDGATE_SCENARIO_DATABASE_URL }
"#;
    let engine = shell_engine(yaml);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_run_status(&result, RunStatus::Succeeded);
    assert_eq!(result.step("build").unwrap().output, "build sees:");
    assert_eq!(result.step("test").unwrap().output, "test sees: declared");
}

/// Whether `pid` has exited (gone or a zombie awaiting its reaper)
#[cfg(target_os = "linux")]
fn process_exited(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map(|rest| rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => true,
    }
}

/// A step timeout stops everything the step's command started
#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_timeout_kills_background_processes() {
    let scratch = tempfile::tempdir().unwrap();
    let pid_file = scratch.path().join("sleep.pid");
    let yaml = format!(
        r#"
name: "Slow"
on:
  push: {{}}
steps:
  - id: build
    build: sleep 30 & echo $! > {}; wait
    timeout_secs: 1
"#,
        pid_file.display()
    );
    let engine = shell_engine(&yaml);

    let result = engine
        .dispatch(&TriggerEvent::push("main"), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        *assert_step_failed(&result, "build"),
        StepError::Timeout(TimeoutCause::Elapsed { secs: 1 })
    );

    let pid: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let mut exited = false;
    for _ in 0..50 {
        if process_exited(pid) {
            exited = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(exited, "sleep {} outlived the timed-out step", pid);
}

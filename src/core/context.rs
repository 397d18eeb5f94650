//! Run context - per-event mutable state

use crate::core::{
    env::ResolvedEnv,
    result::{Artifact, RunResult, StepRecord},
    state::RunStatus,
    step::Step,
    trigger::TriggerEvent,
};
use crate::secrets::SecretValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use tempfile::TempDir;
use uuid::Uuid;

/// Replacement text for secret values in output
pub const MASK: &str = "***";

/// Execution context for a single run
///
/// Created by the provisioner for one accepted event and dropped when the run
/// finishes. Dropping it removes the working directory and releases every
/// resolved secret.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    event: TriggerEvent,

    /// Job-scoped environment (builtins + definition defaults)
    job_env: ResolvedEnv,

    /// Step-scoped overrides, by step id
    step_env: HashMap<String, ResolvedEnv>,

    /// Every secret resolved for this run, by name
    secrets: HashMap<String, SecretValue>,

    workspace: TempDir,

    records: Vec<StepRecord>,
    artifacts: Vec<Artifact>,
    started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(
        run_id: Uuid,
        event: TriggerEvent,
        job_env: ResolvedEnv,
        step_env: HashMap<String, ResolvedEnv>,
        secrets: HashMap<String, SecretValue>,
        workspace: TempDir,
    ) -> Self {
        Self {
            run_id,
            event,
            job_env,
            step_env,
            secrets,
            workspace,
            records: Vec::new(),
            artifacts: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn event(&self) -> &TriggerEvent {
        &self.event
    }

    /// The run's ephemeral working directory
    pub fn workdir(&self) -> &Path {
        self.workspace.path()
    }

    pub fn job_env(&self) -> &ResolvedEnv {
        &self.job_env
    }

    /// Environment for one step: the job environment extended with the
    /// step's overrides. The job environment itself is never modified.
    pub fn environment_for(&self, step: &Step) -> ResolvedEnv {
        match self.step_env.get(&step.id) {
            Some(overrides) => self.job_env.extended(overrides),
            None => self.job_env.clone(),
        }
    }

    pub fn secret(&self, name: &str) -> Option<&SecretValue> {
        self.secrets.get(name)
    }

    /// Replace every resolved secret value in `text` with `***`
    pub fn mask(&self, text: &str) -> String {
        let mut values: Vec<&str> = self
            .secrets
            .values()
            .map(SecretValue::expose)
            .filter(|v| !v.is_empty())
            .collect();
        // Longest first so a secret containing another is masked whole
        values.sort_by_key(|v| std::cmp::Reverse(v.len()));

        let mut masked = text.to_string();
        for value in values {
            masked = masked.replace(value, MASK);
        }
        masked
    }

    pub fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Snapshot the context into a run record
    pub fn to_result(
        &self,
        pipeline_name: &str,
        status: RunStatus,
        failed_step: Option<String>,
    ) -> RunResult {
        RunResult {
            run_id: self.run_id,
            pipeline_name: pipeline_name.to_string(),
            event: self.event.clone(),
            status,
            steps: self.records.clone(),
            failed_step,
            artifacts: self.artifacts.clone(),
            report: None,
            started_at: self.started_at,
            finished_at: match status {
                RunStatus::Succeeded | RunStatus::Failed => Some(Utc::now()),
                RunStatus::Pending | RunStatus::Running => None,
            },
        }
    }
}

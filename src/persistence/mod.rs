//! Persistence layer for run history
//!
//! Only summaries are stored: statuses, step counts and timestamps. Step
//! output and environment values never reach a backend.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::{EventKind, RunResult, RunStatus, StepState};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub event: EventKind,
    pub branch: String,
    pub commit: Option<String>,
    pub status: RunStatus,

    /// First failing step, if any
    pub failed_step: Option<String>,

    /// `Delivered` / `Degraded`, or `None` without a report step
    pub report: Option<String>,

    pub steps_succeeded: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn from_result(result: &RunResult) -> Self {
        Self {
            run_id: result.run_id,
            pipeline_name: result.pipeline_name.clone(),
            event: result.event.kind,
            branch: result.event.branch.clone(),
            commit: result.event.commit.clone(),
            status: result.status,
            failed_step: result.failed_step.clone(),
            report: result.report.as_ref().map(|r| r.label().to_string()),
            steps_succeeded: result.count_steps(StepState::is_success),
            steps_failed: result.count_steps(StepState::is_failure),
            steps_skipped: result.count_steps(StepState::is_skipped),
            started_at: result.started_at,
            finished_at: result.finished_at,
        }
    }

    pub fn total_steps(&self) -> usize {
        self.steps_succeeded + self.steps_failed + self.steps_skipped
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List runs of a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
    by_pipeline: tokio::sync::RwLock<std::collections::HashMap<String, Vec<Uuid>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
            by_pipeline: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        let replaced = runs.insert(run.run_id, run.clone()).is_some();

        if !replaced {
            let mut by_pipeline = self.by_pipeline.write().await;
            by_pipeline
                .entry(run.pipeline_name.clone())
                .or_default()
                .push(run.run_id);
        }

        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let by_pipeline = self.by_pipeline.read().await;

        let mut result: Vec<RunSummary> = by_pipeline
            .get(pipeline_name)
            .map(|ids| ids.iter().filter_map(|id| runs.get(id).cloned()).collect())
            .unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let by_pipeline = self.by_pipeline.read().await;
        let mut names: Vec<String> = by_pipeline.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

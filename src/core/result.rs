//! Terminal run records

use crate::core::{
    error::StepError,
    state::{RunStatus, StepState},
    trigger::TriggerEvent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Lines of captured output kept per step
pub const OUTPUT_TAIL_LINES: usize = 50;

/// Outcome of one step, as recorded in the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub name: String,
    pub state: StepState,

    /// Exit code of the action, when it ran to completion
    pub exit_code: Option<i32>,

    /// Masked tail of the captured output
    pub output: String,
}

impl StepRecord {
    pub fn skipped(step_id: &str, name: &str, reason: impl Into<String>) -> Self {
        let mut state = StepState::Pending;
        state.skip(reason);
        Self {
            step_id: step_id.to_string(),
            name: name.to_string(),
            state,
            exit_code: None,
            output: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Coverage,
}

/// Handle to a file produced by a step, relative to the run's workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub step_id: String,
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// Outcome of the reporting step. Never feeds back into `RunResult::status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportOutcome {
    /// The integration accepted the upload
    Delivered { uploaded_bytes: usize },
    /// The integration could not be reached or rejected the upload
    Degraded { reason: String },
}

impl ReportOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, ReportOutcome::Degraded { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReportOutcome::Delivered { .. } => "Delivered",
            ReportOutcome::Degraded { .. } => "Degraded",
        }
    }
}

/// Terminal record of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub event: TriggerEvent,

    /// Build/test verdict
    pub status: RunStatus,

    /// Build/test steps in execution order. The reporting step is recorded in
    /// `report` instead.
    pub steps: Vec<StepRecord>,

    /// First step that failed, if any
    pub failed_step: Option<String>,

    pub artifacts: Vec<Artifact>,

    /// Reporting verdict; `None` when the pipeline has no reporting step
    pub report: Option<ReportOutcome>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.step_id == step_id)
    }

    /// Error of the failing step
    pub fn failure(&self) -> Option<&StepError> {
        self.failed_step
            .as_deref()
            .and_then(|id| self.step(id))
            .and_then(|r| r.state.error())
    }

    pub fn coverage(&self) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == ArtifactKind::Coverage)
    }

    pub fn report_degraded(&self) -> bool {
        self.report.as_ref().is_some_and(ReportOutcome::is_degraded)
    }

    pub fn count_steps(&self, predicate: impl Fn(&StepState) -> bool) -> usize {
        self.steps.iter().filter(|r| predicate(&r.state)).count()
    }
}

/// Keep the last `max_lines` lines of `text`
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        text.trim_end().to_string()
    } else {
        lines[lines.len() - max_lines..].join("\n")
    }
}

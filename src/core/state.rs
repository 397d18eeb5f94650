//! Execution state models

use crate::core::error::StepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Overall run status. Independent of the reporting outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run has not started
    Pending,
    /// Run is executing steps
    Running,
    /// Every build/test step succeeded
    Succeeded,
    /// A step failed or provisioning was aborted
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "Pending",
            RunStatus::Running => "Running",
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(RunStatus::Pending),
            "Running" => Ok(RunStatus::Running),
            "Succeeded" => Ok(RunStatus::Succeeded),
            "Failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {}", other)),
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not been reached
    Pending,
    /// Step is currently running
    Running { started_at: DateTime<Utc> },
    /// Step action finished with success
    Succeeded {
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    },
    /// Step action failed
    Failed {
        error: StepError,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step was not executed because an earlier step failed
    Skipped { reason: String },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StepState::Succeeded { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StepState::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepState::Skipped { .. })
    }

    /// Move a pending step to running
    pub fn start(&mut self) {
        if matches!(self, StepState::Pending) {
            *self = StepState::Running {
                started_at: Utc::now(),
            };
        }
    }

    /// Move a running step to succeeded
    pub fn succeed(&mut self) {
        if let StepState::Running { started_at } = *self {
            *self = StepState::Succeeded {
                started_at,
                finished_at: Utc::now(),
            };
        }
    }

    /// Move a running step to failed
    pub fn fail(&mut self, error: StepError) {
        if let StepState::Running { started_at } = *self {
            *self = StepState::Failed {
                error,
                started_at,
                failed_at: Utc::now(),
            };
        }
    }

    /// Move a pending step to skipped
    pub fn skip(&mut self, reason: impl Into<String>) {
        if matches!(self, StepState::Pending) {
            *self = StepState::Skipped {
                reason: reason.into(),
            };
        }
    }

    pub fn error(&self) -> Option<&StepError> {
        match self {
            StepState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Run-level state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: RunStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            status: RunStatus::Pending,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark run as started
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Mark run as succeeded
    pub fn succeed(&mut self) {
        self.status = RunStatus::Succeeded;
        self.finished_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
    }
}

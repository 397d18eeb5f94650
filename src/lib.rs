//! buildgate - a trigger-driven build pipeline runner

pub mod actions;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod reporting;
pub mod secrets;

// Re-export commonly used types
pub use actions::{ActionError, ActionOutput, ActionRunner, ShellActionRunner, ShellConfig};
pub use core::{
    EventKind, PipelineDefinition, ProvisionError, ReportOutcome, RunContext, RunResult, RunStatus,
    Step, StepError, StepState, TriggerEvent,
};
pub use execution::{Dispatcher, ExecutionEvent, PipelineEngine};
pub use reporting::{CoverageReporter, HttpCoverageReporter, ReportError};
pub use secrets::{SecretStore, SecretValue};

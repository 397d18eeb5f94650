//! Pipeline execution: provisioning, the step loop, reporting and dispatch

pub mod dispatcher;
pub mod engine;
pub mod executor;
pub mod provisioner;
pub mod reporter;

pub use dispatcher::{DispatchedRun, Dispatcher};
pub use engine::{EventHandler, ExecutionEvent, PipelineEngine};
pub use executor::{ExecutionResult, StepExecutor};
pub use provisioner::provision;
pub use reporter::ResultReporter;

//! External actions: source checkout and build/test commands

pub mod response;
pub mod shell;

use async_trait::async_trait;
use std::path::PathBuf;

pub use response::{ActionError, ActionOutput};
pub use shell::{ShellActionRunner, ShellConfig};

/// Checkout request for one run
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Repository to clone; `None` uses the runner's default source
    pub repository: Option<String>,

    /// Branch or ref to check out
    pub reference: String,

    /// Exact commit, when the event names one
    pub commit: Option<String>,

    /// Clone depth, 0 for full history
    pub depth: u32,

    /// Empty directory to materialize the source into
    pub workdir: PathBuf,

    /// Merged step environment
    pub env: Vec<(String, String)>,
}

/// Command request for a build or test step
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub command: String,
    pub workdir: PathBuf,

    /// Merged step environment
    pub env: Vec<(String, String)>,
}

/// Trait for action execution - allows for different implementations
///
/// Implementations must stop the underlying work when the returned future is
/// dropped; the step runner relies on that to enforce timeouts and
/// cancellation.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    /// Materialize the project source into `request.workdir`
    async fn checkout(&self, request: &CheckoutRequest) -> Result<ActionOutput, ActionError>;

    /// Run an opaque command and capture its exit status and output
    async fn run_command(&self, request: &CommandRequest) -> Result<ActionOutput, ActionError>;
}

#[async_trait]
impl<A: ActionRunner + ?Sized> ActionRunner for std::sync::Arc<A> {
    async fn checkout(&self, request: &CheckoutRequest) -> Result<ActionOutput, ActionError> {
        (**self).checkout(request).await
    }

    async fn run_command(&self, request: &CommandRequest) -> Result<ActionOutput, ActionError> {
        (**self).run_command(request).await
    }
}

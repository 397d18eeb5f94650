//! Step executor - runs one build, test or checkout step through the action runner

use crate::{
    actions::{ActionError, ActionOutput, ActionRunner, CheckoutRequest, CommandRequest},
    core::{
        tail_lines, ResolvedEnv, RunContext, Step, StepAction, StepError, TimeoutCause,
        OUTPUT_TAIL_LINES,
    },
};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Result of executing a step. Output is already masked and truncated.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Action exited with status 0
    Success {
        exit_code: Option<i32>,
        output: String,
    },
    /// Action exited non-zero, could not run, or was terminated
    Failed {
        error: StepError,
        exit_code: Option<i32>,
        output: String,
    },
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }
}

/// Executes a single step
pub struct StepExecutor<A> {
    actions: A,

    /// Repository cloned by checkout steps that do not name one
    repository: Option<String>,
}

impl<A: ActionRunner> StepExecutor<A> {
    pub fn new(actions: A) -> Self {
        Self {
            actions,
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: Option<String>) -> Self {
        self.repository = repository;
        self
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    fn checkout_request(
        &self,
        spec: &crate::core::CheckoutSpec,
        context: &RunContext,
        env: &ResolvedEnv,
    ) -> CheckoutRequest {
        let event = context.event();
        // An explicit ref overrides the event, including its commit
        let (reference, commit) = match &spec.reference {
            Some(reference) => (reference.clone(), None),
            None => (event.branch.clone(), event.commit.clone()),
        };
        CheckoutRequest {
            repository: spec.repository.clone().or_else(|| self.repository.clone()),
            reference,
            commit,
            depth: spec.depth,
            workdir: context.workdir().to_path_buf(),
            env: env.to_process_env(),
        }
    }

    async fn invoke(
        &self,
        step: &Step,
        context: &RunContext,
        env: &ResolvedEnv,
    ) -> Result<ActionOutput, ActionError> {
        match &step.action {
            StepAction::Checkout(spec) => {
                let request = self.checkout_request(spec, context, env);
                self.actions.checkout(&request).await
            }
            StepAction::Build { command } | StepAction::Test { command, .. } => {
                let request = CommandRequest {
                    command: command.clone(),
                    workdir: context.workdir().to_path_buf(),
                    env: env.to_process_env(),
                };
                self.actions.run_command(&request).await
            }
            StepAction::Report(_) => Err(ActionError::Unavailable(
                "report steps are run by the result reporter".to_string(),
            )),
        }
    }

    /// Execute a step with its merged environment
    ///
    /// The action is bounded by the step's timeout and by `cancel`. Either one
    /// drops the in-flight action future, which terminates its child process.
    pub async fn execute(
        &self,
        step: &Step,
        context: &RunContext,
        env: &ResolvedEnv,
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        info!("Executing step: {} ({})", step.id, step.action.label());
        debug!("Step {} environment keys: {:?}", step.id, env.keys().collect::<Vec<_>>());

        let budget = Duration::from_secs(step.timeout_secs);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TimeoutCause::Cancelled),
            result = timeout(budget, self.invoke(step, context, env)) => {
                result.map_err(|_| TimeoutCause::Elapsed { secs: step.timeout_secs })
            }
        };

        match outcome {
            Ok(Ok(output)) => {
                let text = tail_lines(&context.mask(&output.combined()), OUTPUT_TAIL_LINES);
                debug!("Step {} output:\n{}", step.id, text);
                if output.is_success() {
                    info!("Step {} completed successfully", step.id);
                    ExecutionResult::Success {
                        exit_code: output.exit_code,
                        output: text,
                    }
                } else {
                    error!("Step {} exited with {:?}", step.id, output.exit_code);
                    ExecutionResult::Failed {
                        error: StepError::NonZeroExit {
                            code: output.exit_code,
                        },
                        exit_code: output.exit_code,
                        output: text,
                    }
                }
            }
            Ok(Err(e)) => {
                let message = context.mask(&e.to_string());
                error!("Action error for step {}: {}", step.id, message);
                let error = match e {
                    ActionError::Checkout(_) => StepError::Checkout(message.clone()),
                    ActionError::Unavailable(_) | ActionError::Internal(_) => {
                        StepError::ActionUnavailable(message.clone())
                    }
                };
                ExecutionResult::Failed {
                    error,
                    exit_code: None,
                    output: message,
                }
            }
            Err(cause) => {
                error!("Step {} terminated: {}", step.id, cause);
                ExecutionResult::Failed {
                    error: StepError::Timeout(cause),
                    exit_code: None,
                    output: String::new(),
                }
            }
        }
    }
}

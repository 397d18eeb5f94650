//! Main execution engine - orchestrates one pipeline run per accepted event

use crate::{
    actions::ActionRunner,
    core::{
        Artifact, ArtifactKind, PipelineDefinition, ProvisionError, ReportOutcome, ReportSpec,
        RunContext, RunResult, RunState, RunStatus, Step, StepAction, StepError, StepRecord,
        StepState, TriggerEvent,
    },
    execution::{provision, ExecutionResult, ResultReporter, StepExecutor},
    reporting::CoverageReporter,
    secrets::SecretStore,
};
use std::path::Path;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        event: TriggerEvent,
        total_steps: usize,
    },
    StepStarted {
        step_id: String,
        name: String,
    },
    StepSucceeded {
        step_id: String,
    },
    StepFailed {
        step_id: String,
        error: StepError,
    },
    StepSkipped {
        step_id: String,
        reason: String,
    },
    ReportFinished {
        step_id: String,
        outcome: ReportOutcome,
    },
    RunFinished {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Pipeline execution engine
///
/// Owns the immutable definition and the collaborators shared by every run.
/// Per-run state lives only in the [`RunContext`] created by `dispatch`.
pub struct PipelineEngine<A, R> {
    definition: Arc<PipelineDefinition>,
    secrets: Arc<dyn SecretStore>,
    executor: StepExecutor<A>,
    reporter: ResultReporter<R>,
    event_handlers: Vec<EventHandler>,
}

impl<A: ActionRunner, R: CoverageReporter> PipelineEngine<A, R> {
    pub fn new(
        definition: Arc<PipelineDefinition>,
        secrets: Arc<dyn SecretStore>,
        actions: A,
        integration: R,
    ) -> Self {
        let executor = StepExecutor::new(actions).with_repository(definition.repository.clone());
        Self {
            definition,
            secrets,
            executor,
            reporter: ResultReporter::new(integration),
            event_handlers: Vec::new(),
        }
    }

    pub fn definition(&self) -> &PipelineDefinition {
        &self.definition
    }

    pub fn executor(&self) -> &StepExecutor<A> {
        &self.executor
    }

    pub fn reporter(&self) -> &ResultReporter<R> {
        &self.reporter
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Evaluate, provision and run the pipeline for one event
    ///
    /// Returns `Ok(None)` when the triggers reject the event. Nothing is
    /// provisioned in that case.
    pub async fn dispatch(
        &self,
        event: &TriggerEvent,
        cancel: &CancellationToken,
    ) -> Result<Option<RunResult>, ProvisionError> {
        if !self.definition.should_run(event) {
            debug!(
                "Pipeline {} not triggered by {} on {}",
                self.definition.name, event.kind, event.branch
            );
            return Ok(None);
        }

        self.start(event, cancel).await.map(Some)
    }

    /// Provision and run the pipeline for an event already accepted by the
    /// triggers. The run context is dropped before this returns.
    pub async fn start(
        &self,
        event: &TriggerEvent,
        cancel: &CancellationToken,
    ) -> Result<RunResult, ProvisionError> {
        let mut context = provision(&self.definition, event, self.secrets.as_ref()).await?;
        Ok(self.run(&self.definition.steps, &mut context, cancel).await)
    }

    /// Run `steps` in order inside `context`
    ///
    /// Build, test and checkout steps are fail-fast: after the first failure
    /// the rest are recorded as skipped. The report step runs once when it is
    /// reached, whatever happened before it.
    pub async fn run(
        &self,
        steps: &[Step],
        context: &mut RunContext,
        cancel: &CancellationToken,
    ) -> RunResult {
        let pipeline_name = self.definition.name.as_str();
        let mut state = RunState::new(context.run_id());
        state.start();

        info!("Starting run {} of pipeline {}", context.run_id(), pipeline_name);
        self.emit_event(ExecutionEvent::RunStarted {
            run_id: context.run_id(),
            pipeline_name: pipeline_name.to_string(),
            event: context.event().clone(),
            total_steps: steps.len(),
        });

        let mut failed_step: Option<String> = None;
        let mut report: Option<ReportOutcome> = None;

        for (index, step) in steps.iter().enumerate() {
            if let StepAction::Report(spec) = &step.action {
                // Verdict so far; still open while build steps remain
                let status = if failed_step.is_some() {
                    RunStatus::Failed
                } else if steps[index + 1..].iter().any(|s| !s.is_report()) {
                    RunStatus::Running
                } else {
                    RunStatus::Succeeded
                };
                let outcome = self.run_report(step, spec, context, status, &failed_step).await;
                self.emit_event(ExecutionEvent::ReportFinished {
                    step_id: step.id.clone(),
                    outcome: outcome.clone(),
                });
                report = Some(outcome);
                continue;
            }

            if let Some(failed) = &failed_step {
                let reason = format!("step '{}' failed", failed);
                info!("Skipping step {}: {}", step.id, reason);
                context.record(StepRecord::skipped(&step.id, step.display_name(), reason.clone()));
                self.emit_event(ExecutionEvent::StepSkipped {
                    step_id: step.id.clone(),
                    reason,
                });
                continue;
            }

            let mut step_state = StepState::Pending;
            step_state.start();
            self.emit_event(ExecutionEvent::StepStarted {
                step_id: step.id.clone(),
                name: step.display_name().to_string(),
            });

            let env = context.environment_for(step);
            let result = self.executor.execute(step, context, &env, cancel).await;

            let (exit_code, output) = match result {
                ExecutionResult::Success { exit_code, output } => {
                    step_state.succeed();
                    self.emit_event(ExecutionEvent::StepSucceeded {
                        step_id: step.id.clone(),
                    });
                    (exit_code, output)
                }
                ExecutionResult::Failed {
                    error,
                    exit_code,
                    output,
                } => {
                    step_state.fail(error.clone());
                    failed_step = Some(step.id.clone());
                    self.emit_event(ExecutionEvent::StepFailed {
                        step_id: step.id.clone(),
                        error,
                    });
                    (exit_code, output)
                }
            };

            context.record(StepRecord {
                step_id: step.id.clone(),
                name: step.display_name().to_string(),
                state: step_state,
                exit_code,
                output,
            });

            // Coverage is kept even when the tests failed
            if let Some(path) = step.coverage_path() {
                register_coverage(context, &step.id, path).await;
            }
        }

        let status = if failed_step.is_some() {
            state.fail();
            RunStatus::Failed
        } else {
            state.succeed();
            RunStatus::Succeeded
        };

        info!(
            "Run {} of pipeline {} finished: {}",
            context.run_id(),
            pipeline_name,
            status
        );
        self.emit_event(ExecutionEvent::RunFinished {
            run_id: context.run_id(),
            status,
        });

        let mut result = context.to_result(pipeline_name, state.status, failed_step);
        result.report = report;
        result
    }

    /// Execute the reporting step. Bounded by the step's timeout only, so a
    /// cancelled run still reports.
    async fn run_report(
        &self,
        step: &Step,
        spec: &ReportSpec,
        context: &RunContext,
        status: RunStatus,
        failed_step: &Option<String>,
    ) -> ReportOutcome {
        info!("Executing report step: {}", step.id);
        let Some(credential) = context.secret(spec.token.name()) else {
            return ReportOutcome::Degraded {
                reason: format!("missing secret: {}", spec.token.name()),
            };
        };

        let snapshot = context.to_result(&self.definition.name, status, failed_step.clone());
        let outcome = match timeout(
            Duration::from_secs(step.timeout_secs),
            self.reporter
                .report(&snapshot, context.workdir(), spec, credential),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => ReportOutcome::Degraded {
                reason: format!("timed out after {} seconds", step.timeout_secs),
            },
        };

        match outcome {
            ReportOutcome::Degraded { reason } => ReportOutcome::Degraded {
                reason: context.mask(&reason),
            },
            delivered => delivered,
        }
    }
}

async fn register_coverage(context: &mut RunContext, step_id: &str, path: &Path) {
    match tokio::fs::metadata(context.workdir().join(path)).await {
        Ok(meta) if meta.is_file() => {
            debug!("Step {} produced coverage at {}", step_id, path.display());
            context.add_artifact(Artifact {
                kind: ArtifactKind::Coverage,
                step_id: step_id.to_string(),
                path: path.to_path_buf(),
                size_bytes: meta.len(),
            });
        }
        _ => warn!("Step {} did not produce coverage at {}", step_id, path.display()),
    }
}

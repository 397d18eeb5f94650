//! Event dispatcher - one isolated run per accepted event

use crate::{
    actions::ActionRunner,
    core::{ProvisionError, RunResult, TriggerEvent},
    execution::PipelineEngine,
    reporting::CoverageReporter,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// A finished run, or the provisioning error that prevented it
#[derive(Debug)]
pub struct DispatchedRun {
    pub event: TriggerEvent,
    pub outcome: Result<RunResult, ProvisionError>,
}

/// Spawns accepted events onto the runtime
///
/// Runs share nothing but the engine. Each gets a child of the dispatcher's
/// cancellation token, so cancelling the dispatcher cancels every run in
/// flight.
pub struct Dispatcher<A, R> {
    engine: Arc<PipelineEngine<A, R>>,
    runs: JoinSet<DispatchedRun>,
    cancel: CancellationToken,
}

impl<A, R> Dispatcher<A, R>
where
    A: ActionRunner + 'static,
    R: CoverageReporter + 'static,
{
    pub fn new(engine: Arc<PipelineEngine<A, R>>, cancel: CancellationToken) -> Self {
        Self {
            engine,
            runs: JoinSet::new(),
            cancel,
        }
    }

    /// Start a run for `event` if the triggers accept it
    pub fn dispatch(&mut self, event: TriggerEvent) -> bool {
        if !self.engine.definition().should_run(&event) {
            debug!("Ignoring {} on {}", event.kind, event.branch);
            return false;
        }

        let engine = self.engine.clone();
        let cancel = self.cancel.child_token();
        self.runs.spawn(async move {
            let outcome = engine.start(&event, &cancel).await;
            DispatchedRun { event, outcome }
        });
        true
    }

    /// Number of runs still in flight
    pub fn in_flight(&self) -> usize {
        self.runs.len()
    }

    /// Wait for the next run to finish. `None` when nothing is in flight.
    pub async fn next_finished(&mut self) -> Option<DispatchedRun> {
        loop {
            match self.runs.join_next().await? {
                Ok(run) => return Some(run),
                Err(e) => error!("Run task failed: {}", e),
            }
        }
    }

    /// Wait for every in-flight run
    pub async fn join_all(mut self) -> Vec<DispatchedRun> {
        let mut finished = Vec::with_capacity(self.runs.len());
        while let Some(run) = self.next_finished().await {
            finished.push(run);
        }
        finished
    }
}

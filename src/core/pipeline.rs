//! Pipeline definition - the immutable configuration a run executes

use crate::core::{
    env::{EnvValue, SecretRef},
    step::Step,
    trigger::{TriggerEvent, TriggerRules},
};
use std::collections::BTreeMap;

/// A validated pipeline definition. Built once from configuration and shared
/// read-only between runs.
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    /// Pipeline name
    pub name: String,

    /// Which events start a run
    pub triggers: TriggerRules,

    /// Job-scoped environment defaults
    pub env: BTreeMap<String, EnvValue>,

    /// Runner profile descriptor
    pub runs_on: String,

    /// Repository to check out when a step does not name one
    pub repository: Option<String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

impl PipelineDefinition {
    /// Trigger evaluation for this pipeline
    pub fn should_run(&self, event: &TriggerEvent) -> bool {
        self.triggers.should_run(event)
    }

    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// The designated reporting step, if any
    pub fn report_step(&self) -> Option<&Step> {
        self.steps.iter().find(|s| s.is_report())
    }

    /// Every secret referenced anywhere in the definition, deduplicated,
    /// in first-use order
    pub fn secret_refs(&self) -> Vec<&SecretRef> {
        let mut refs: Vec<&SecretRef> = Vec::new();
        let job_refs = self.env.values().filter_map(EnvValue::secret_ref);
        let step_refs = self.steps.iter().flat_map(|s| s.secret_refs());
        for secret in job_refs.chain(step_refs) {
            if !refs.contains(&secret) {
                refs.push(secret);
            }
        }
        refs
    }
}

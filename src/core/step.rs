//! Step domain model

use crate::core::env::{EnvValue, SecretRef};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique step identifier
    pub id: String,

    /// Optional human-readable name
    pub name: Option<String>,

    /// What the step does
    pub action: StepAction,

    /// Step-scoped environment overrides
    pub env: BTreeMap<String, EnvValue>,

    /// Timeout in seconds
    pub timeout_secs: u64,
}

/// The action a step performs
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    /// Materialize the project source into the working directory
    Checkout(CheckoutSpec),

    /// Invoke the build command
    Build { command: String },

    /// Invoke the test command; may leave a coverage file behind
    Test {
        command: String,
        coverage: Option<PathBuf>,
    },

    /// Forward the run outcome and coverage to the reporting integration
    Report(ReportSpec),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSpec {
    /// Repository to clone (defaults to the pipeline's repository)
    pub repository: Option<String>,

    /// Ref to check out instead of the event's branch
    pub reference: Option<String>,

    /// Shallow clone depth; 0 means full history
    pub depth: u32,
}

impl Default for CheckoutSpec {
    fn default() -> Self {
        Self {
            repository: None,
            reference: None,
            depth: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSpec {
    /// Credential for the reporting integration
    pub token: SecretRef,

    /// Surface a degraded report as a non-zero CLI exit. Never changes the
    /// run's own status.
    pub fail_on_error: bool,

    /// Free-form flags forwarded to the integration
    pub flags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StepDefaults {
    pub timeout_secs: u64,
}

impl Default for StepDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 1800, // 30 minutes
        }
    }
}

impl StepAction {
    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            StepAction::Checkout(_) => "checkout",
            StepAction::Build { .. } => "build",
            StepAction::Test { .. } => "test",
            StepAction::Report(_) => "report",
        }
    }
}

impl Step {
    /// Name if set, id otherwise
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Whether this is the designated reporting step
    pub fn is_report(&self) -> bool {
        matches!(self.action, StepAction::Report(_))
    }

    /// Coverage file this step may produce, relative to the workspace
    pub fn coverage_path(&self) -> Option<&PathBuf> {
        match &self.action {
            StepAction::Test { coverage, .. } => coverage.as_ref(),
            _ => None,
        }
    }

    /// Every secret this step needs, in declaration order
    pub fn secret_refs(&self) -> Vec<&SecretRef> {
        let mut refs: Vec<&SecretRef> = self.env.values().filter_map(EnvValue::secret_ref).collect();
        if let StepAction::Report(spec) = &self.action {
            refs.push(&spec.token);
        }
        refs
    }
}

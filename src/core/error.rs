//! Error taxonomy for provisioning and step execution

use crate::secrets::SecretStoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure to set up a run. Always fatal, and always raised before any step
/// executes.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("missing secret: {0}")]
    MissingSecret(String),

    #[error("secret store error: {0}")]
    SecretStore(#[from] SecretStoreError),

    #[error("failed to create workspace: {0}")]
    Workspace(#[from] std::io::Error),
}

/// Why an in-flight action was terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeoutCause {
    /// The step's time budget elapsed
    Elapsed { secs: u64 },
    /// The caller cancelled the run
    Cancelled,
}

impl fmt::Display for TimeoutCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutCause::Elapsed { secs } => write!(f, "exceeded {} seconds", secs),
            TimeoutCause::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Failure of a single step. Fatal to the remaining build/test steps.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StepError {
    #[error("exited with code {}", display_code(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("timed out: {0}")]
    Timeout(TimeoutCause),

    #[error("action unavailable: {0}")]
    ActionUnavailable(String),

    #[error("checkout failed: {0}")]
    Checkout(String),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<signal>".to_string(),
    }
}

impl StepError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, StepError::Timeout(_))
    }
}

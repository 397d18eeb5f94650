//! Action output and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for action invocation
#[derive(Debug, Error)]
pub enum ActionError {
    /// The command or tool could not be started at all
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Source checkout failed (network, auth, unknown ref)
    #[error("checkout error: {0}")]
    Checkout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Exit status and captured output of an action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,

    pub stdout: String,

    pub stderr: String,
}

impl ActionOutput {
    /// Create a successful output
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create an output with a non-zero exit
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.trim_end().is_empty(), self.stderr.trim_end().is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.trim_end().to_string(),
            (true, false) => self.stderr.trim_end().to_string(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr.trim_end()),
        }
    }
}

//! Coverage reporting integrations

pub mod http;

use crate::core::{EventKind, RunStatus};
use crate::secrets::SecretValue;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use http::HttpCoverageReporter;

/// Error types for reporting integrations
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("coverage artifact unreadable: {0}")]
    Artifact(String),

    #[error("no reporting integration configured")]
    NotConfigured,
}

/// Coverage file contents
#[derive(Debug, Clone)]
pub struct CoverageArtifact {
    /// File name, as declared on the test step
    pub name: String,
    pub contents: Vec<u8>,
}

/// Everything sent to the reporting integration for one run
#[derive(Debug, Clone)]
pub struct CoverageUpload {
    pub run_id: Uuid,
    pub pipeline: String,
    pub event: EventKind,
    pub branch: String,
    pub commit: Option<String>,

    /// Build/test verdict at the time of reporting
    pub status: RunStatus,

    pub flags: Vec<String>,

    /// `None` when no step produced coverage
    pub artifact: Option<CoverageArtifact>,
}

impl CoverageUpload {
    pub fn artifact_len(&self) -> usize {
        self.artifact.as_ref().map(|a| a.contents.len()).unwrap_or(0)
    }
}

/// Trait for reporting integrations
#[async_trait]
pub trait CoverageReporter: Send + Sync {
    /// Deliver an upload, authenticated by `token`
    async fn upload(&self, upload: &CoverageUpload, token: &SecretValue) -> Result<(), ReportError>;
}

/// Reporter used when no integration endpoint is configured. Every upload
/// comes back as `NotConfigured`, which the result reporter records as a
/// degraded outcome.
#[derive(Debug, Clone, Default)]
pub struct DisabledReporter;

#[async_trait]
impl CoverageReporter for DisabledReporter {
    async fn upload(&self, _upload: &CoverageUpload, _token: &SecretValue) -> Result<(), ReportError> {
        Err(ReportError::NotConfigured)
    }
}

#[async_trait]
impl<R: CoverageReporter + ?Sized> CoverageReporter for std::sync::Arc<R> {
    async fn upload(&self, upload: &CoverageUpload, token: &SecretValue) -> Result<(), ReportError> {
        (**self).upload(upload, token).await
    }
}

#[async_trait]
impl<R: CoverageReporter + ?Sized> CoverageReporter for Box<R> {
    async fn upload(&self, upload: &CoverageUpload, token: &SecretValue) -> Result<(), ReportError> {
        (**self).upload(upload, token).await
    }
}

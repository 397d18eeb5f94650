//! HTTP coverage upload client
//!
//! Posts the coverage file as the request body to a single upload endpoint.
//! Run metadata travels as query parameters and the token as an
//! `Authorization: token <value>` header.

use crate::reporting::{CoverageReporter, CoverageUpload, ReportError};
use crate::secrets::SecretValue;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default request timeout for uploads
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Longest rejection body kept in the error message
const MAX_ERROR_BODY: usize = 200;

/// Reporting integration over HTTP
pub struct HttpCoverageReporter {
    /// Upload endpoint URL
    endpoint: String,

    /// Shared HTTP client with connection pooling
    http_client: Client,
}

impl HttpCoverageReporter {
    /// Creates a reporter with the default timeout
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ReportError> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a reporter with a custom request timeout
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ReportError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReportError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn query(upload: &CoverageUpload) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("run_id", upload.run_id.to_string()),
            ("pipeline", upload.pipeline.clone()),
            ("event", upload.event.to_string()),
            ("branch", upload.branch.clone()),
            ("status", upload.status.to_string()),
        ];
        if let Some(commit) = &upload.commit {
            query.push(("commit", commit.clone()));
        }
        if !upload.flags.is_empty() {
            query.push(("flags", upload.flags.join(",")));
        }
        if let Some(artifact) = &upload.artifact {
            query.push(("name", artifact.name.clone()));
        }
        query
    }
}

#[async_trait]
impl CoverageReporter for HttpCoverageReporter {
    async fn upload(&self, upload: &CoverageUpload, token: &SecretValue) -> Result<(), ReportError> {
        let body = upload
            .artifact
            .as_ref()
            .map(|a| a.contents.clone())
            .unwrap_or_default();

        debug!(
            "Uploading {} bytes of coverage for run {} to {}",
            body.len(),
            upload.run_id,
            self.endpoint
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&Self::query(upload))
            .header("Authorization", format!("token {}", token.expose()))
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| ReportError::Network(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            info!("Coverage upload accepted for run {}", upload.run_id);
            return Ok(());
        }

        let mut message = response.text().await.unwrap_or_default().trim().to_string();
        if !token.is_empty() {
            message = message.replace(token.expose(), crate::core::MASK);
        }
        if message.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|i| message.is_char_boundary(*i))
                .unwrap_or(0);
            message.truncate(cut);
        }
        warn!("Coverage upload rejected with {}: {}", status, message);
        Err(ReportError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

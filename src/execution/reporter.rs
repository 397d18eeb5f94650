//! Result reporter - forwards the run outcome and coverage to the reporting integration

use crate::core::{ReportOutcome, ReportSpec, RunResult, MASK};
use crate::reporting::{CoverageArtifact, CoverageReporter, CoverageUpload, ReportError};
use crate::secrets::SecretValue;
use std::path::Path;
use tracing::{info, warn};

pub struct ResultReporter<R> {
    integration: R,
}

impl<R: CoverageReporter> ResultReporter<R> {
    pub fn new(integration: R) -> Self {
        Self { integration }
    }

    pub fn integration(&self) -> &R {
        &self.integration
    }

    async fn read_coverage(
        result: &RunResult,
        workspace: &Path,
    ) -> Result<Option<CoverageArtifact>, ReportError> {
        let Some(artifact) = result.coverage() else {
            return Ok(None);
        };
        let contents = tokio::fs::read(workspace.join(&artifact.path))
            .await
            .map_err(|e| ReportError::Artifact(format!("{}: {}", artifact.path.display(), e)))?;
        let name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| artifact.path.display().to_string());
        Ok(Some(CoverageArtifact { name, contents }))
    }

    /// Send the coverage artifact and run metadata to the integration
    ///
    /// Never fails: every error becomes [`ReportOutcome::Degraded`].
    pub async fn report(
        &self,
        result: &RunResult,
        workspace: &Path,
        spec: &ReportSpec,
        credential: &SecretValue,
    ) -> ReportOutcome {
        let attempt = async {
            let upload = CoverageUpload {
                run_id: result.run_id,
                pipeline: result.pipeline_name.clone(),
                event: result.event.kind,
                branch: result.event.branch.clone(),
                commit: result.event.commit.clone(),
                status: result.status,
                flags: spec.flags.clone(),
                artifact: Self::read_coverage(result, workspace).await?,
            };
            self.integration.upload(&upload, credential).await?;
            Ok::<usize, ReportError>(upload.artifact_len())
        };

        match attempt.await {
            Ok(uploaded_bytes) => {
                info!("Report delivered for run {} ({} bytes)", result.run_id, uploaded_bytes);
                ReportOutcome::Delivered { uploaded_bytes }
            }
            Err(e) => {
                let mut reason = e.to_string();
                if !credential.is_empty() {
                    reason = reason.replace(credential.expose(), MASK);
                }
                warn!("Report degraded for run {}: {}", result.run_id, reason);
                ReportOutcome::Degraded { reason }
            }
        }
    }
}

//! Environment provisioner - builds the isolated context for one run

use crate::core::{
    EnvValue, PipelineDefinition, ProvisionError, ResolvedEnv, ResolvedValue, RunContext,
    TriggerEvent,
};
use crate::secrets::{SecretStore, SecretValue};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of the run's temporary working directory
const WORKSPACE_PREFIX: &str = "buildgate-";

/// Environment variables every step sees, before the definition's own
/// defaults are applied
fn builtin_env(run_id: Uuid, event: &TriggerEvent, workspace: &str) -> ResolvedEnv {
    let mut env = ResolvedEnv::new();
    env.insert_plain("CI", "true");
    env.insert_plain("BUILDGATE_RUN_ID", run_id.to_string());
    env.insert_plain("BUILDGATE_EVENT", event.kind.to_string());
    env.insert_plain("BUILDGATE_BRANCH", event.branch.clone());
    if let Some(commit) = &event.commit {
        env.insert_plain("BUILDGATE_COMMIT", commit.clone());
    }
    env.insert_plain("BUILDGATE_WORKSPACE", workspace);
    env
}

fn resolve_env(
    declared: &BTreeMap<String, EnvValue>,
    secrets: &HashMap<String, SecretValue>,
) -> Result<ResolvedEnv, ProvisionError> {
    let mut env = ResolvedEnv::new();
    for (key, value) in declared {
        let resolved = match value {
            EnvValue::Literal(value) => ResolvedValue::Plain(value.clone()),
            EnvValue::Secret { secret } => {
                let value = secrets
                    .get(secret.name())
                    .ok_or_else(|| ProvisionError::MissingSecret(secret.name().to_string()))?;
                ResolvedValue::Secret(value.clone())
            }
        };
        env.insert(key.clone(), resolved);
    }
    Ok(env)
}

/// Create the run context for an accepted event
///
/// Every secret referenced by the definition is looked up exactly once. The
/// first absent secret aborts provisioning with
/// [`ProvisionError::MissingSecret`] and no workspace is left behind.
pub async fn provision(
    definition: &PipelineDefinition,
    event: &TriggerEvent,
    store: &dyn SecretStore,
) -> Result<RunContext, ProvisionError> {
    let run_id = Uuid::new_v4();
    debug!("Provisioning run {} for pipeline {}", run_id, definition.name);

    let mut secrets = HashMap::new();
    for secret in definition.secret_refs() {
        match store.get(secret.name()).await? {
            Some(value) => {
                secrets.insert(secret.name().to_string(), value);
            }
            None => {
                warn!("Run {} aborted: secret {} is not available", run_id, secret.name());
                return Err(ProvisionError::MissingSecret(secret.name().to_string()));
            }
        }
    }

    let workspace = tempfile::Builder::new()
        .prefix(WORKSPACE_PREFIX)
        .tempdir()?;
    let workspace_path = workspace.path().to_string_lossy().into_owned();

    let job_env = builtin_env(run_id, event, &workspace_path)
        .extended(&resolve_env(&definition.env, &secrets)?);

    let mut step_env = HashMap::new();
    for step in &definition.steps {
        if !step.env.is_empty() {
            step_env.insert(step.id.clone(), resolve_env(&step.env, &secrets)?);
        }
    }

    info!(
        "Provisioned run {} ({} secrets, workspace {})",
        run_id,
        secrets.len(),
        workspace_path
    );

    Ok(RunContext::new(
        run_id,
        event.clone(),
        job_env,
        step_env,
        secrets,
        workspace,
    ))
}

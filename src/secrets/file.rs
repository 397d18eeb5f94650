//! Secret store backed by a YAML file of `NAME: value` pairs

use crate::secrets::{SecretStore, SecretStoreError, SecretValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Reads a YAML mapping on every lookup. Nothing is cached, so each run sees
/// the file as it is when the run is provisioned.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn load(&self) -> Result<HashMap<String, String>, SecretStoreError> {
        let read_error = |message: String| SecretStoreError::Read {
            path: self.path.display().to_string(),
            message,
        };

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| read_error(e.to_string()))?;

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_yaml::from_str(&content).map_err(|e| read_error(e.to_string()))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError> {
        let secrets = self.load().await?;
        Ok(secrets.get(name).map(|v| SecretValue::new(v.clone())))
    }
}

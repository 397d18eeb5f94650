//! Secret store backed by the process environment

use crate::secrets::{SecretStore, SecretStoreError, SecretValue};
use async_trait::async_trait;
use std::env::VarError;

/// Reads secrets from environment variables, optionally behind a prefix
/// (`BUILDGATE_SECRET_` + name, for instance).
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    prefix: Option<String>,
}

impl EnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn variable_name(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}{}", prefix, name),
            None => name.to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    async fn get(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError> {
        let variable = self.variable_name(name);
        match std::env::var(&variable) {
            Ok(value) => Ok(Some(SecretValue::new(value))),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(SecretStoreError::Unavailable(format!(
                "environment variable {} is not valid unicode",
                variable
            ))),
        }
    }
}

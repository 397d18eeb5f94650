//! Secret stores and the redacting secret value wrapper

pub mod env;
pub mod file;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub use env::EnvSecretStore;
pub use file::FileSecretStore;

/// A resolved credential. `Debug` and `Display` never show the value, and
/// the type does not implement `Serialize`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue(***)")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

/// Error types for secret store backends
#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("failed to read secrets from {path}: {message}")]
    Read { path: String, message: String },

    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value lookup of credentials by name
///
/// `Ok(None)` means the secret is absent, which is distinct from a secret
/// whose value is the empty string.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError>;
}

/// In-memory secret store (for testing or embedding)
#[derive(Debug, Clone, Default)]
pub struct InMemorySecretStore {
    secrets: HashMap<String, SecretValue>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.secrets.insert(name.into(), SecretValue::new(value));
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, name: &str) -> Result<Option<SecretValue>, SecretStoreError> {
        Ok(self.secrets.get(name).cloned())
    }
}

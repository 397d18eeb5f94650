//! Environment entries and their resolved form

use crate::secrets::SecretValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of a credential held by the secret store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRef(String);

impl SecretRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "secrets.{}", self.0)
    }
}

/// Declared value of an environment entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    /// Literal value embedded in the definition
    Literal(String),
    /// Reference resolved from the secret store at run time
    Secret { secret: SecretRef },
}

impl EnvValue {
    pub fn literal(value: impl Into<String>) -> Self {
        EnvValue::Literal(value.into())
    }

    pub fn secret(name: impl Into<String>) -> Self {
        EnvValue::Secret {
            secret: SecretRef::new(name),
        }
    }

    pub fn secret_ref(&self) -> Option<&SecretRef> {
        match self {
            EnvValue::Literal(_) => None,
            EnvValue::Secret { secret } => Some(secret),
        }
    }
}

/// A resolved environment value. Secret values stay wrapped so that `Debug`
/// output of an environment never shows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    Plain(String),
    Secret(SecretValue),
}

impl ResolvedValue {
    fn expose(&self) -> &str {
        match self {
            ResolvedValue::Plain(value) => value,
            ResolvedValue::Secret(secret) => secret.expose(),
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, ResolvedValue::Secret(_))
    }
}

/// Resolved environment mapping handed to actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnv {
    entries: BTreeMap<String, ResolvedValue>,
}

impl ResolvedEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ResolvedValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn insert_plain(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert(key, ResolvedValue::Plain(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Copy-on-extend: returns a new environment where `overrides` shadow
    /// this one. `self` is left untouched.
    pub fn extended(&self, overrides: &ResolvedEnv) -> ResolvedEnv {
        let mut merged = self.clone();
        for (key, value) in &overrides.entries {
            merged.entries.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Plain key/value pairs for a child process. This is the only place
    /// secret values leave their wrapper.
    pub fn to_process_env(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.expose().to_string()))
            .collect()
    }
}

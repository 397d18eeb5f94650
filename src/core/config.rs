//! Pipeline configuration from YAML

use crate::core::{
    env::{EnvValue, SecretRef},
    pipeline::PipelineDefinition,
    step::{CheckoutSpec, ReportSpec, Step, StepAction, StepDefaults},
    trigger::{BranchPattern, EventKind, TriggerRule, TriggerRules},
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Pipeline version (optional)
    #[serde(default)]
    pub version: Option<String>,

    /// Trigger rules
    #[serde(rename = "on")]
    pub triggers: TriggersConfig,

    /// Job-scoped environment defaults
    #[serde(default)]
    env: BTreeMap<String, Value>,

    /// Runner profile descriptor
    #[serde(default)]
    pub runs_on: Option<String>,

    /// Repository checked out by `checkout` steps
    #[serde(default)]
    pub repository: Option<String>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Pipeline steps
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// Which event kinds start a run, each with its branch filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggersConfig {
    #[serde(default)]
    pub push: Option<BranchFilterConfig>,

    #[serde(default)]
    pub pull_request: Option<BranchFilterConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BranchFilterConfig {
    /// Branch patterns; empty matches every branch
    #[serde(default)]
    pub branches: Vec<BranchPatternConfig>,
}

/// A branch pattern: a literal name, or an opt-in regex
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchPatternConfig {
    Name(String),
    Pattern {
        pattern: String,
        #[serde(default)]
        regex: bool,
    },
}

/// Step configuration as defined in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step identifier
    pub id: String,

    /// Human-readable step name
    #[serde(default)]
    pub name: Option<String>,

    /// Optional step description
    #[serde(default)]
    pub description: Option<String>,

    /// Check out the project source
    #[serde(default)]
    pub checkout: Option<CheckoutConfig>,

    /// Build command
    #[serde(default)]
    pub build: Option<String>,

    /// Test command
    #[serde(default)]
    pub test: Option<String>,

    /// Coverage file left by the test command, relative to the workspace
    #[serde(default)]
    pub coverage: Option<String>,

    /// Upload results to the reporting integration
    #[serde(default)]
    pub report: Option<ReportConfig>,

    /// Step-scoped environment overrides
    #[serde(default)]
    env: BTreeMap<String, Value>,

    /// Timeout for this step (overrides global)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutConfig {
    #[serde(default)]
    pub repository: Option<String>,

    #[serde(default, rename = "ref")]
    pub reference: Option<String>,

    /// Clone depth, 0 for full history
    #[serde(default)]
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Secret holding the integration token
    pub token: SecretSourceConfig,

    #[serde(default)]
    pub fail_on_error: bool,

    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretSourceConfig {
    pub secret: String,
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        if self.triggers.push.is_none() && self.triggers.pull_request.is_none() {
            anyhow::bail!("Pipeline '{}' has no triggers", self.name);
        }
        self.trigger_rules()?;

        if self.default_timeout_secs == Some(0) {
            anyhow::bail!("default_timeout_secs must be greater than zero");
        }

        for (key, value) in &self.env {
            parse_env_entry(key, value).context("Invalid job environment")?;
        }

        // Check that all step IDs are unique
        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                anyhow::bail!("Step IDs must not be empty");
            }
            if !seen_ids.insert(&step.id) {
                anyhow::bail!("Duplicate step ID: {}", step.id);
            }
        }

        let report_steps: Vec<&str> = self
            .steps
            .iter()
            .filter(|s| s.report.is_some())
            .map(|s| s.id.as_str())
            .collect();
        if report_steps.len() > 1 {
            anyhow::bail!(
                "Only one report step is allowed, found: {}",
                report_steps.join(", ")
            );
        }

        for step in &self.steps {
            step.validate()?;
        }

        Ok(())
    }

    /// Get the job environment as parsed EnvValue entries
    pub fn get_env(&self) -> Result<BTreeMap<String, EnvValue>> {
        parse_env(&self.env)
    }

    /// Compile the trigger section
    pub fn trigger_rules(&self) -> Result<TriggerRules> {
        let mut rules = Vec::new();
        let kinds = [
            (EventKind::Push, &self.triggers.push),
            (EventKind::PullRequest, &self.triggers.pull_request),
        ];
        for (kind, filter) in kinds {
            if let Some(filter) = filter {
                let branches = filter
                    .branches
                    .iter()
                    .map(BranchPatternConfig::compile)
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Invalid branch pattern for '{}'", kind))?;
                rules.push(TriggerRule { kind, branches });
            }
        }
        Ok(TriggerRules::new(rules))
    }

    /// Convert config to the immutable pipeline definition
    pub fn to_definition(&self) -> Result<PipelineDefinition> {
        let defaults = StepDefaults {
            timeout_secs: self
                .default_timeout_secs
                .unwrap_or(StepDefaults::default().timeout_secs),
        };

        let steps = self
            .steps
            .iter()
            .map(|s| s.to_step(&defaults))
            .collect::<Result<Vec<_>>>()?;

        Ok(PipelineDefinition {
            name: self.name.clone(),
            triggers: self.trigger_rules()?,
            env: self.get_env()?,
            runs_on: self.runs_on.clone().unwrap_or_else(|| "local".to_string()),
            repository: self.repository.clone(),
            steps,
        })
    }

    /// Number of job-scoped environment entries
    pub fn env_len(&self) -> usize {
        self.env.len()
    }
}

impl BranchPatternConfig {
    fn compile(&self) -> Result<BranchPattern> {
        match self {
            BranchPatternConfig::Name(name) => Ok(BranchPattern::Exact(name.clone())),
            BranchPatternConfig::Pattern { pattern, regex: false } => {
                Ok(BranchPattern::Exact(pattern.clone()))
            }
            BranchPatternConfig::Pattern { pattern, regex: true } => BranchPattern::regex(pattern)
                .with_context(|| format!("Invalid branch regex '{}'", pattern)),
        }
    }
}

impl StepConfig {
    fn validate(&self) -> Result<()> {
        let actions = [
            self.checkout.is_some(),
            self.build.is_some(),
            self.test.is_some(),
            self.report.is_some(),
        ];
        match actions.iter().filter(|a| **a).count() {
            0 => anyhow::bail!(
                "Step '{}' has no action (expected one of checkout, build, test, report)",
                self.id
            ),
            1 => {}
            _ => anyhow::bail!("Step '{}' declares more than one action", self.id),
        }

        for (kind, command) in [("build", &self.build), ("test", &self.test)] {
            if let Some(command) = command {
                if command.trim().is_empty() {
                    anyhow::bail!("Step '{}' has an empty {} command", self.id, kind);
                }
            }
        }

        if let Some(coverage) = &self.coverage {
            if self.test.is_none() {
                anyhow::bail!("Step '{}' declares coverage but is not a test step", self.id);
            }
            if !is_workspace_relative(Path::new(coverage)) {
                anyhow::bail!(
                    "Step '{}' coverage path must be relative to the workspace: {}",
                    self.id,
                    coverage
                );
            }
        }

        if let Some(report) = &self.report {
            if report.token.secret.trim().is_empty() {
                anyhow::bail!("Step '{}' report token must name a secret", self.id);
            }
        }

        if self.timeout_secs == Some(0) {
            anyhow::bail!("Step '{}' timeout_secs must be greater than zero", self.id);
        }

        for (key, value) in &self.env {
            parse_env_entry(key, value)
                .with_context(|| format!("Invalid environment for step '{}'", self.id))?;
        }

        Ok(())
    }

    /// Get step-scoped environment as parsed EnvValue entries
    pub fn get_env(&self) -> Result<BTreeMap<String, EnvValue>> {
        parse_env(&self.env)
    }

    fn to_step(&self, defaults: &StepDefaults) -> Result<Step> {
        let action = if let Some(checkout) = &self.checkout {
            let fallback = CheckoutSpec::default();
            StepAction::Checkout(CheckoutSpec {
                repository: checkout.repository.clone(),
                reference: checkout.reference.clone(),
                depth: checkout.depth.unwrap_or(fallback.depth),
            })
        } else if let Some(command) = &self.build {
            StepAction::Build {
                command: command.clone(),
            }
        } else if let Some(command) = &self.test {
            StepAction::Test {
                command: command.clone(),
                coverage: self.coverage.as_ref().map(PathBuf::from),
            }
        } else if let Some(report) = &self.report {
            StepAction::Report(ReportSpec {
                token: SecretRef::new(report.token.secret.clone()),
                fail_on_error: report.fail_on_error,
                flags: report.flags.clone(),
            })
        } else {
            anyhow::bail!("Step '{}' has no action", self.id);
        };

        Ok(Step {
            id: self.id.clone(),
            name: self.name.clone(),
            action,
            env: self.get_env()?,
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
        })
    }
}

fn parse_env(entries: &BTreeMap<String, Value>) -> Result<BTreeMap<String, EnvValue>> {
    entries
        .iter()
        .map(|(k, v)| Ok((k.clone(), parse_env_entry(k, v)?)))
        .collect()
}

/// Parse one environment entry: scalars become literals, `{ secret: NAME }`
/// becomes a secret reference.
fn parse_env_entry(key: &str, value: &Value) -> Result<EnvValue> {
    if key.is_empty() || key.contains('=') || key.contains('\0') {
        anyhow::bail!("Invalid environment variable name: '{}'", key);
    }

    match value {
        Value::String(s) => Ok(EnvValue::Literal(s.clone())),
        Value::Bool(b) => Ok(EnvValue::Literal(b.to_string())),
        Value::Number(n) => Ok(EnvValue::Literal(n.to_string())),
        Value::Mapping(map) => {
            let secret = map
                .get(&Value::String("secret".to_string()))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty());
            match (secret, map.len()) {
                (Some(name), 1) => Ok(EnvValue::secret(name)),
                _ => anyhow::bail!(
                    "Environment variable '{}' must be a scalar or {{ secret: NAME }}",
                    key
                ),
            }
        }
        _ => anyhow::bail!(
            "Environment variable '{}' must be a scalar or {{ secret: NAME }}",
            key
        ),
    }
}

fn is_workspace_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

//! Trigger evaluation - decides whether an incoming event starts a run

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of event delivered by the trigger source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Push,
    PullRequest,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Push => write!(f, "push"),
            EventKind::PullRequest => write!(f, "pull_request"),
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull_request" => Ok(EventKind::PullRequest),
            other => Err(format!("unknown event kind: {}", other)),
        }
    }
}

/// An incoming event from the trigger source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// What happened
    pub kind: EventKind,

    /// Target branch of the push or pull request
    pub branch: String,

    /// Commit to check out (defaults to the branch head)
    #[serde(default)]
    pub commit: Option<String>,
}

impl TriggerEvent {
    pub fn new(kind: EventKind, branch: impl Into<String>) -> Self {
        Self {
            kind,
            branch: branch.into(),
            commit: None,
        }
    }

    pub fn push(branch: impl Into<String>) -> Self {
        Self::new(EventKind::Push, branch)
    }

    pub fn pull_request(branch: impl Into<String>) -> Self {
        Self::new(EventKind::PullRequest, branch)
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

/// Pattern for matching a branch name (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum BranchPattern {
    /// Literal branch name equality
    Exact(String),
    /// Regular expression, anchored to the whole branch name
    Regex(Regex),
}

impl BranchPattern {
    /// Check if the pattern matches the given branch
    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchPattern::Exact(name) => name == branch,
            BranchPattern::Regex(regex) => regex.is_match(branch),
        }
    }

    /// Compile an anchored regex pattern
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{})$", pattern)).map(BranchPattern::Regex)
    }
}

impl fmt::Display for BranchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchPattern::Exact(name) => write!(f, "{}", name),
            BranchPattern::Regex(regex) => write!(f, "[regex: {}]", regex.as_str()),
        }
    }
}

/// A single trigger rule: one event kind and the branches it applies to
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub kind: EventKind,

    /// Empty means every branch
    pub branches: Vec<BranchPattern>,
}

impl TriggerRule {
    pub fn accepts(&self, event: &TriggerEvent) -> bool {
        self.kind == event.kind
            && (self.branches.is_empty() || self.branches.iter().any(|p| p.matches(&event.branch)))
    }
}

/// The full set of trigger rules for a pipeline
#[derive(Debug, Clone, Default)]
pub struct TriggerRules {
    pub rules: Vec<TriggerRule>,
}

impl TriggerRules {
    pub fn new(rules: Vec<TriggerRule>) -> Self {
        Self { rules }
    }

    /// Decide whether an event should start a run. Non-matching events are a
    /// normal outcome, not an error.
    pub fn should_run(&self, event: &TriggerEvent) -> bool {
        self.rules.iter().any(|rule| rule.accepts(event))
    }

    /// Event kinds that have at least one rule
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<EventKind> = Vec::new();
        for rule in &self.rules {
            if !kinds.contains(&rule.kind) {
                kinds.push(rule.kind);
            }
        }
        kinds
    }
}

//! CLI command definitions

use crate::core::{EventKind, TriggerEvent};
use clap::Args;
use std::path::PathBuf;

/// Run the pipeline for a single event
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Event kind
    #[arg(short, long, value_enum, default_value_t = EventKindArg::Push)]
    pub event: EventKindArg,

    /// Target branch of the event
    #[arg(short, long)]
    pub branch: String,

    /// Commit to check out instead of the branch tip
    #[arg(long)]
    pub commit: Option<String>,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

impl RunCommand {
    pub fn trigger_event(&self) -> TriggerEvent {
        let event = TriggerEvent::new(self.event.into(), self.branch.clone());
        match &self.commit {
            Some(commit) => event.with_commit(commit.clone()),
            None => event,
        }
    }
}

/// Read newline-delimited JSON events from stdin and run each accepted one
#[derive(Debug, Args, Clone)]
pub struct ListenCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

/// Options shared by commands that execute runs
#[derive(Debug, Args, Clone)]
pub struct RuntimeArgs {
    /// YAML file mapping secret names to values
    #[arg(long, conflicts_with = "secret_env_prefix")]
    pub secrets_file: Option<PathBuf>,

    /// Resolve secret NAME from environment variable <PREFIX>NAME
    #[arg(long)]
    pub secret_env_prefix: Option<String>,

    /// Coverage upload endpoint; reports are degraded when unset
    #[arg(long)]
    pub report_url: Option<String>,

    /// Cancel runs still in flight after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Shell used for build and test commands
    #[arg(long, default_value = "sh")]
    pub shell: String,

    /// Don't save runs to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Event kind argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventKindArg {
    Push,
    #[value(name = "pull_request", alias = "pull-request")]
    PullRequest,
}

impl From<EventKindArg> for EventKind {
    fn from(arg: EventKindArg) -> Self {
        match arg {
            EventKindArg::Push => EventKind::Push,
            EventKindArg::PullRequest => EventKind::PullRequest,
        }
    }
}

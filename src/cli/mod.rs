//! Command-line interface

pub mod commands;
pub mod output;

use crate::core::{PipelineDefinition, RunResult, StepAction};
use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ListenCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Trigger-driven build pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "buildgate")]
#[command(version)]
#[command(about = "Run checkout, build, test and coverage reporting for matching events", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the pipeline for one event
    Run(RunCommand),

    /// Run the pipeline for events read from stdin
    Listen(ListenCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}

/// Process exit code for a finished run
///
/// A failed run exits 1. A degraded report exits 1 only when the report step
/// sets `fail_on_error`.
pub fn exit_code(result: &RunResult, definition: &PipelineDefinition) -> i32 {
    if !result.is_success() {
        return 1;
    }
    let strict = match definition.report_step().map(|s| &s.action) {
        Some(StepAction::Report(spec)) => spec.fail_on_error,
        _ => false,
    };
    if strict && result.report_degraded() {
        1
    } else {
        0
    }
}

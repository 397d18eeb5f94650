//! CLI output formatting

use crate::{
    core::{ReportOutcome, RunResult, RunStatus, StepRecord, StepState},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the step count
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Whether an event completes one step of the progress bar
pub fn advances_progress(event: &ExecutionEvent) -> bool {
    matches!(
        event,
        ExecutionEvent::StepSucceeded { .. }
            | ExecutionEvent::StepFailed { .. }
            | ExecutionEvent::StepSkipped { .. }
            | ExecutionEvent::ReportFinished { .. }
    )
}

/// Horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80);
    "─".repeat(width)
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
    }
}

pub fn format_report(outcome: &ReportOutcome) -> String {
    match outcome {
        ReportOutcome::Delivered { uploaded_bytes } => format!(
            "{} {}",
            style("DELIVERED").green(),
            style(format!("({} bytes)", uploaded_bytes)).dim()
        ),
        ReportOutcome::Degraded { reason } => {
            format!("{} {}", style("DEGRADED").yellow(), style(reason).dim())
        }
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            pipeline_name,
            event,
            total_steps,
        } => format!(
            "{} Starting {} for {} on {} ({} steps, run {})",
            ROCKET,
            style(pipeline_name).bold(),
            style(event.kind).cyan(),
            style(&event.branch).cyan(),
            total_steps,
            style(short_id(run_id)).dim()
        ),
        ExecutionEvent::StepStarted { step_id, name } => {
            if name == step_id {
                format!("{} {}", SPINNER, style(step_id).cyan())
            } else {
                format!("{} {} {}", SPINNER, style(name).cyan(), style(format!("[{}]", step_id)).dim())
            }
        }
        ExecutionEvent::StepSucceeded { step_id } => {
            format!("{} {}", CHECK, style(step_id).green())
        }
        ExecutionEvent::StepFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        ExecutionEvent::StepSkipped { step_id, reason } => {
            format!("{} {} ({})", SKIP, style(step_id).dim(), reason)
        }
        ExecutionEvent::ReportFinished { step_id, outcome } => {
            let icon = if outcome.is_degraded() { WARN } else { CHECK };
            format!("{} {} {}", icon, style(step_id).bold(), format_report(outcome))
        }
        ExecutionEvent::RunFinished { run_id, status } => format!(
            "{} Run {} {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    }
}

fn format_step_record(record: &StepRecord) -> String {
    let detail = match &record.state {
        StepState::Failed { error, .. } => format!(" - {}", error),
        StepState::Skipped { reason } => format!(" - {}", reason),
        _ => String::new(),
    };
    format!(
        "  {:<20} {}{}",
        record.name,
        format_step_state(&record.state),
        style(detail).dim()
    )
}

/// Format a finished run for display
pub fn format_run_result(result: &RunResult) -> String {
    let icon = if result.is_success() { CHECK } else { CROSS };
    let mut lines = vec![
        separator(),
        format!(
            "{} {} {} ({} on {}, run {})",
            icon,
            style(&result.pipeline_name).bold(),
            format_status(result.status),
            result.event.kind,
            result.event.branch,
            style(short_id(&result.run_id)).dim()
        ),
    ];
    lines.extend(result.steps.iter().map(format_step_record));

    if let Some(coverage) = result.coverage() {
        lines.push(format!(
            "  Coverage: {} {}",
            coverage.path.display(),
            style(format!("({} bytes)", coverage.size_bytes)).dim()
        ));
    }
    if let Some(report) = &result.report {
        lines.push(format!("  Report: {}", format_report(report)));
    }
    if let Some(finished) = result.finished_at {
        if let Ok(duration) = finished.signed_duration_since(result.started_at).to_std() {
            lines.push(format!("  Duration: {}", style(format_duration(duration)).dim()));
        }
    }
    if let Some(record) = result.failed_step.as_deref().and_then(|id| result.step(id)) {
        if !record.output.is_empty() {
            lines.push(format!("\n{} Output of {}:", INFO, style(&record.step_id).red()));
            lines.push(record.output.clone());
        }
    }
    lines.join("\n")
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };

    let report = summary
        .report
        .as_deref()
        .map(|r| format!(" - report {}", r))
        .unwrap_or_default();

    format!(
        "{} {} - {} - {} {} - {} ({}/{} steps succeeded){}",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.pipeline_name).bold(),
        summary.event,
        style(&summary.branch).cyan(),
        format_status(summary.status),
        summary.steps_succeeded,
        summary.total_steps(),
        report
    )
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

use anyhow::{Context, Result};
use buildgate::cli::commands::{HistoryCommand, ListenCommand, RunCommand, RuntimeArgs, ValidateCommand};
use buildgate::cli::output::*;
use buildgate::cli::{exit_code, Cli, Command};
use buildgate::core::config::PipelineConfig;
use buildgate::core::{PipelineDefinition, RunResult, TriggerEvent};
use buildgate::execution::{DispatchedRun, Dispatcher, PipelineEngine};
use buildgate::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use buildgate::reporting::{CoverageReporter, DisabledReporter, HttpCoverageReporter};
use buildgate::secrets::{EnvSecretStore, FileSecretStore, SecretStore};
use buildgate::{ShellActionRunner, ShellConfig};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

type Engine = PipelineEngine<ShellActionRunner, Box<dyn CoverageReporter>>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    let code = match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Listen(cmd) => listen(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn load_definition(file: &str) -> Result<Arc<PipelineDefinition>> {
    let config = PipelineConfig::from_file(file).context("Failed to load pipeline config")?;
    Ok(Arc::new(config.to_definition()?))
}

fn secret_store(args: &RuntimeArgs) -> Arc<dyn SecretStore> {
    match (&args.secrets_file, &args.secret_env_prefix) {
        (Some(path), _) => Arc::new(FileSecretStore::new(path.clone())),
        (None, Some(prefix)) => Arc::new(EnvSecretStore::with_prefix(prefix.clone())),
        (None, None) => Arc::new(EnvSecretStore::new()),
    }
}

fn build_engine(definition: Arc<PipelineDefinition>, args: &RuntimeArgs) -> Result<Engine> {
    let integration: Box<dyn CoverageReporter> = match &args.report_url {
        Some(url) => Box::new(HttpCoverageReporter::new(url.clone())?),
        None => {
            if definition.report_step().is_some() {
                warn!("No --report-url given; the report step will be degraded");
            }
            Box::new(DisabledReporter)
        }
    };
    let actions = ShellActionRunner::new(ShellConfig::new().with_shell(args.shell.clone()));
    Ok(PipelineEngine::new(definition, secret_store(args), actions, integration))
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(buildgate::persistence::SqliteRunStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn history_for(args: &RuntimeArgs) -> Result<Arc<dyn PersistenceBackend>> {
    if args.no_history {
        Ok(Arc::new(InMemoryPersistence::new()))
    } else {
        open_history().await
    }
}

/// Cancel `cancel` on Ctrl-C or once `timeout_secs` elapses
fn watch_cancellation(cancel: CancellationToken, timeout_secs: Option<u64>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async move {
            match timeout_secs {
                Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, cancelling runs");
                cancel.cancel();
            }
            _ = deadline => {
                warn!("Timeout reached, cancelling runs");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    })
}

async fn save_history(store: &Arc<dyn PersistenceBackend>, result: &RunResult, no_history: bool) {
    if no_history {
        return;
    }
    let summary = RunSummary::from_result(result);
    match store.save_run(&summary).await {
        Ok(()) => info!("Run {} saved to history", summary.run_id),
        Err(e) => error!("Failed to save run {} to history: {:#}", summary.run_id, e),
    }
}

async fn run_pipeline(cmd: &RunCommand) -> Result<i32> {
    let definition = load_definition(&cmd.file)?;
    println!("{} Loaded pipeline: {}", INFO, style(&definition.name).bold());

    let event = cmd.trigger_event();
    if !definition.should_run(&event) {
        println!(
            "{} {} on {} does not trigger {}",
            INFO,
            event.kind,
            style(&event.branch).cyan(),
            style(&definition.name).bold()
        );
        return Ok(0);
    }

    let mut engine = build_engine(definition.clone(), &cmd.runtime)?;
    let store = history_for(&cmd.runtime).await?;

    let progress = create_progress_bar(definition.steps.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        bar.println(format_execution_event(&event));
        if advances_progress(&event) {
            bar.inc(1);
        }
    });

    let cancel = CancellationToken::new();
    let watcher = watch_cancellation(cancel.clone(), cmd.runtime.timeout);
    let outcome = engine.start(&event, &cancel).await;
    watcher.abort();
    progress.finish_and_clear();

    match outcome {
        Ok(result) => {
            println!("{}", format_run_result(&result));
            save_history(&store, &result, cmd.runtime.no_history).await;
            Ok(exit_code(&result, &definition))
        }
        Err(e) => {
            println!("{} Run aborted before any step: {}", CROSS, style(e).red());
            Ok(1)
        }
    }
}

async fn listen(cmd: &ListenCommand) -> Result<i32> {
    let definition = load_definition(&cmd.file)?;
    println!(
        "{} Listening for events for {} on stdin",
        INFO,
        style(&definition.name).bold()
    );

    let engine = Arc::new(build_engine(definition.clone(), &cmd.runtime)?);
    let store = history_for(&cmd.runtime).await?;
    let cancel = CancellationToken::new();
    let watcher = watch_cancellation(cancel.clone(), cmd.runtime.timeout);
    let mut dispatcher = Dispatcher::new(engine, cancel);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut code = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read event from stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<TriggerEvent>(&line) {
                    Ok(event) => {
                        if !dispatcher.dispatch(event.clone()) {
                            println!("{} Ignored {} on {}", INFO, event.kind, style(&event.branch).dim());
                        }
                    }
                    Err(e) => warn!("Skipping malformed event: {}", e),
                }
            }
            Some(run) = dispatcher.next_finished(), if dispatcher.in_flight() > 0 => {
                code = code.max(finish_dispatched(&store, &definition, run, cmd.runtime.no_history).await);
            }
        }
    }

    for run in dispatcher.join_all().await {
        code = code.max(finish_dispatched(&store, &definition, run, cmd.runtime.no_history).await);
    }
    watcher.abort();
    Ok(code)
}

async fn finish_dispatched(
    store: &Arc<dyn PersistenceBackend>,
    definition: &PipelineDefinition,
    run: DispatchedRun,
    no_history: bool,
) -> i32 {
    match run.outcome {
        Ok(result) => {
            println!("{}", format_run_result(&result));
            save_history(store, &result, no_history).await;
            exit_code(&result, definition)
        }
        Err(e) => {
            println!(
                "{} Run for {} on {} aborted: {}",
                CROSS,
                run.event.kind,
                run.event.branch,
                style(e).red()
            );
            1
        }
    }
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<i32> {
    println!("{} Validating pipeline...", INFO);

    let result = PipelineConfig::from_file(&cmd.file).and_then(|config| {
        let definition = config.to_definition()?;
        Ok((config, definition))
    });

    match result {
        Ok((config, definition)) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&definition.name).bold());
            let kinds: Vec<String> = definition.triggers.kinds().iter().map(|k| k.to_string()).collect();
            println!("  Triggers: {}", style(kinds.join(", ")).cyan());
            println!("  Runs on: {}", style(&definition.runs_on).cyan());
            println!("  Steps: {}", style(definition.steps.len()).cyan());
            println!("  Env: {}", style(config.env_len()).cyan());
            let secrets: Vec<&str> = definition.secret_refs().iter().map(|s| s.name()).collect();
            if !secrets.is_empty() {
                println!("  Secrets: {}", style(secrets.join(", ")).dim());
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(0)
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            Ok(1)
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<i32> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => print_run_details(&summary, cmd.json)?,
            None => println!("{} Run not found", WARN),
        }
        return Ok(0);
    }

    let mut runs = match &cmd.pipeline {
        Some(pipeline_name) => store.list_runs(pipeline_name).await?,
        None => {
            let mut all = Vec::new();
            for pipeline in store.list_pipelines().await? {
                all.extend(store.list_runs(&pipeline).await?);
            }
            all.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            all
        }
    };
    runs.truncate(cmd.limit);

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(0);
    }

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        println!("{} Run history (showing latest {}):", INFO, cmd.limit);
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(0)
}

fn print_run_details(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Event: {} on {}", summary.event, style(&summary.branch).cyan());
    if let Some(commit) = &summary.commit {
        println!("  Commit: {}", style(commit).dim());
    }
    println!("  Status: {}", format_status(summary.status));
    if let Some(step) = &summary.failed_step {
        println!("  Failed step: {}", style(step).red());
    }
    if let Some(report) = &summary.report {
        println!("  Report: {}", report);
    }
    println!(
        "  Steps: {} succeeded, {} failed, {} skipped",
        style(summary.steps_succeeded).green(),
        style(summary.steps_failed).red(),
        style(summary.steps_skipped).dim()
    );
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(finished) = summary.finished_at {
        if let Ok(duration) = finished.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    Ok(())
}

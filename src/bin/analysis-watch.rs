//! analysis-watch: start an analysis task for a backup job and follow it to
//! the end.
//!
//! Exit codes: `0` analysis finished, `1` the pipeline reported failure,
//! `2` configuration or task creation failed, `130` interrupted.

use analysis_tasks::logging::init_logging_with_default;
use analysis_tasks::{DisplayStatus, EngineConfig, TaskOrchestrator, WorkflowSnapshot};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;

/// Start an analysis task for a backup job and print its progress
#[derive(Parser)]
#[command(name = "analysis-watch")]
#[command(version, long_about = None)]
struct Cli {
    /// Backup job to analyze
    job_id: String,

    /// TOML configuration file (environment variables override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend base URL, e.g. https://dashboard.example.com/api/v1
    #[arg(long)]
    base_url: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

/// Exit code for configuration and task creation failures.
const EXIT_SETUP_FAILED: u8 = 2;

/// Builds the configuration from the file (or defaults), then `env`, then
/// the command-line flags. Later layers win.
fn load_config<F>(cli: &Cli, env: F) -> analysis_tasks::Result<EngineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let base = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let mut config = base.merge_env(env)?;

    if let Some(url) = &cli.base_url {
        config.api.base_url = url.clone();
    }
    if let Some(ms) = cli.interval_ms {
        config.poll.interval_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, PartialEq)]
enum Finish {
    Done(DisplayStatus),
    Interrupted,
}

impl Finish {
    fn exit_code(&self) -> u8 {
        match self {
            Finish::Done(DisplayStatus::Success) => 0,
            Finish::Done(_) => 1,
            Finish::Interrupted => 130,
        }
    }
}

async fn follow(updates: &mut watch::Receiver<WorkflowSnapshot>) -> Finish {
    let mut last_phase = None;
    let mut last_failures = 0;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let snapshot = updates.borrow_and_update().clone();

        if last_phase != Some(snapshot.state.phase) {
            last_phase = Some(snapshot.state.phase);
            println!("[{}] {}", snapshot.state.status, snapshot.state.message);
        }
        match &snapshot.polling_error {
            Some(err) if err.consecutive_failures != last_failures => {
                last_failures = err.consecutive_failures;
                eprintln!("warning: {}", err);
            },
            None => last_failures = 0,
            _ => {},
        }

        if snapshot.state.status.is_final() {
            if let Some(analysis) = snapshot.record.as_ref().and_then(|r| r.ai_analysis()) {
                println!();
                println!("Problem:            {}", analysis.problem_summary);
                println!("Probable cause:     {}", analysis.probable_cause);
                println!("Recommended action: {}", analysis.recommended_action);
            }
            return Finish::Done(snapshot.state.status);
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Finish::Done(DisplayStatus::Error);
                }
            }
            _ = &mut ctrl_c => return Finish::Interrupted,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging_with_default(if cli.verbose { "debug" } else { "warn" });

    let config = match load_config(&cli, |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_SETUP_FAILED);
        },
    };

    let orchestrator = match TaskOrchestrator::from_config(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_SETUP_FAILED);
        },
    };

    let mut updates = orchestrator.subscribe();
    match orchestrator.start(cli.job_id.as_str()).await {
        Ok(record) => println!("Created analysis task {} for job {}", record.id, cli.job_id),
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(EXIT_SETUP_FAILED);
        },
    }

    let finish = follow(&mut updates).await;
    orchestrator.stop();

    if finish == Finish::Interrupted {
        eprintln!("interrupted");
    }
    ExitCode::from(finish.exit_code())
}

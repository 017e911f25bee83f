//! `quasar` — validate and run automation definitions from the
//! command line.
//!
//! `run` executes against the in-process scripted browser driver (no
//! real browser is linked), which makes it a dry-run harness for an
//! automation's flow, HTTP, and storage logic: HTTP actions hit real
//! endpoints, artifacts land in a local report directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quasar_automation::AutomationDefinition;
use quasar_cache::InMemoryRunCache;
use quasar_core::ProjectId;
use quasar_driver::testing::ScriptedDriver;
use quasar_plugins::builtin_registry;
use quasar_run::{InMemoryRunRepository, RunStatus};
use quasar_runner::{RunService, RunnerConfig};
use quasar_storage::FsStore;
use tracing::info;

#[derive(Parser)]
#[command(name = "quasar", version, about = "Declarative automation runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a definition file without running it.
    Validate {
        /// Path to the automation JSON document.
        file: PathBuf,
    },
    /// Execute a definition and write report artifacts.
    Run {
        /// Path to the automation JSON document.
        file: PathBuf,
        /// Directory report artifacts are written under.
        #[arg(long, default_value = "quasar-reports")]
        report_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Validate { file } => validate(&file).map(|()| ExitCode::SUCCESS),
        Command::Run { file, report_dir } => run(&file, &report_dir).await,
    };
    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn load(file: &Path) -> Result<AutomationDefinition> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let definition = AutomationDefinition::from_json(&text)
        .with_context(|| format!("parsing {}", file.display()))?;
    definition.validate().context("validating definition")?;
    let registry = builtin_registry();
    definition
        .validate_action_kinds(|kind| registry.contains(kind))
        .context("validating action types")?;
    Ok(definition)
}

fn validate(file: &Path) -> Result<()> {
    let definition = load(file)?;
    let mut actions = 0usize;
    definition.visit_actions(&mut |_| actions += 1);
    println!(
        "OK: {} ({} steps, {} actions)",
        definition.automation.name,
        definition.steps.len(),
        actions,
    );
    Ok(())
}

async fn run(file: &Path, report_dir: &Path) -> Result<ExitCode> {
    let definition = load(file)?;
    let config = RunnerConfig::from_env()?;

    let service = RunService::new(
        Arc::new(InMemoryRunRepository::new()),
        Arc::new(InMemoryRunCache::new()),
        Arc::new(ScriptedDriver::new()),
        Arc::new(FsStore::new(report_dir)),
        Arc::new(builtin_registry()),
        config,
    );

    let automation_id = service.register_automation(definition, ProjectId::v4())?;
    let run = service.trigger_run(automation_id).await?;
    info!(run_id = %run.id, "run triggered");

    let record = loop {
        let record = service.get_run(run.id).await?;
        if record.status.is_terminal() {
            break record;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    };

    // Give the post-terminal report upload a moment to land.
    let record = {
        let mut latest = record;
        for _ in 0..40 {
            if latest.output_files.iter().any(|u| u.ends_with("report.html")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            latest = service.get_run(run.id).await?;
        }
        latest
    };

    println!("run {}: {}", record.id, record.status);
    if let Some(duration) = record.duration() {
        println!("duration: {} ms", duration.num_milliseconds());
    }
    if let Some(error) = &record.error_message {
        println!("error: {error}");
    }
    for url in &record.output_files {
        println!("artifact: {url}");
    }

    Ok(match record.status {
        RunStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

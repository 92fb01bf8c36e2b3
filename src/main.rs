//! Memory Sync - extract memories from a conversation export and sync them
//! to an Open WebUI instance.
//!
//! Reads a ChatGPT-style `conversations.json`, collects every message sent
//! to the memory (`bio`) channel, writes them to a JSON Lines artifact and
//! reconciles them with the memories stored remotely:
//!   memory-sync                         # extract + sync with defaults
//!   memory-sync -i export.json --dry-run
//!   memory-sync --extract-only -o memories.jsonl

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    extract_memories, format_plan_table, format_stats, format_summary, Reconciler,
};
use cli::Cli;
use domain::Memory;
use infrastructure::{
    load_config, user_config_path, write_default_config, write_memories_jsonl, OpenWebUiClient,
    RemoteStore,
};

/// Exit status when the run completed but some operations failed.
const EXIT_OPERATION_FAILURES: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            if let domain::AppError::Remote(remote) = &e {
                if remote.is_unavailable() {
                    eprintln!("Check that OPEN_WEBUI_URL is reachable from this machine.");
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<ExitCode> {
    if cli.init_config {
        return cmd_init_config();
    }

    dotenvy::dotenv().ok();
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // Validate remote settings before touching the export
    let settings = if cli.extract_only {
        None
    } else {
        Some(config.remote_settings()?)
    };

    let memories = match &cli.from_artifact {
        Some(path) => {
            let memories = application::extractor::memories_from_artifact(path)?;
            println!(
                "{} Loaded {} memories from {}",
                "✓".green().bold(),
                memories.len(),
                path.display()
            );
            memories
        }
        None => extract_and_write(&config.paths.input, &config.paths.output)?,
    };

    let Some(settings) = settings else {
        return Ok(ExitCode::SUCCESS);
    };

    let store: Arc<dyn RemoteStore> = Arc::new(OpenWebUiClient::new(settings)?);
    let reconciler = Reconciler::new(store, config.worker_count()).with_progress(|done, total| {
        println!("  {} {done}/{total} operations", "…".dimmed());
    });

    println!("{} Fetching remote memories...", "→".cyan().bold());
    let plan = reconciler.plan(&memories).await?;

    if cli.dry_run {
        println!("{}", format_plan_table(&plan));
        return Ok(ExitCode::SUCCESS);
    }

    if plan.is_empty() {
        println!("{} Remote store already in sync", "✓".green().bold());
    } else {
        println!(
            "{} Applying {} operations ({} creates, {} deletes)...",
            "→".cyan().bold(),
            plan.operation_count(),
            plan.create_count(),
            plan.delete_count()
        );
    }

    let summary = reconciler.apply(plan).await;
    println!("{}", format_summary(&summary));

    if summary.has_failures() && config.sync.fail_on_error {
        return Ok(ExitCode::from(EXIT_OPERATION_FAILURES));
    }

    Ok(ExitCode::SUCCESS)
}

/// Parse the export and write the artifact.
fn extract_and_write(
    input: &std::path::Path,
    output: &std::path::Path,
) -> domain::Result<Vec<Memory>> {
    println!("{} Extracting memories from {}...", "→".cyan().bold(), input.display());

    let (memories, stats) = extract_memories(input, &|done, total| {
        println!("  {} {done}/{total} conversations", "…".dimmed());
    })?;
    println!("{}", format_stats(&stats));

    write_memories_jsonl(output, &memories)?;
    println!(
        "{} Wrote {} memories to {}",
        "✓".green().bold(),
        memories.len(),
        output.display()
    );

    Ok(memories)
}

/// Write the default config template.
fn cmd_init_config() -> domain::Result<ExitCode> {
    let path = user_config_path()
        .ok_or_else(|| domain::AppError::config("Could not determine config directory"))?;

    if write_default_config(&path)? {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("Config already exists: {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

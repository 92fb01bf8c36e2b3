//! CLI interface using clap.
//!
//! A single invocation with no required arguments; flags override the
//! configuration file and environment.

use std::path::PathBuf;

use clap::Parser;

use crate::domain::AppConfig;

/// Memory Sync - extract memories from a conversation export and sync them
/// to an Open WebUI instance.
#[derive(Parser, Debug)]
#[command(name = "memory-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Conversation export to read (default: conversations.json).
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Where to write the extracted memories as JSON Lines
    /// (default: extracted_memories.jsonl).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Configuration file (default: ./memory-sync.toml, then the user config dir).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent network workers.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Show the planned operations without applying them.
    #[arg(long)]
    pub dry_run: bool,

    /// Only extract and write the artifact; do not contact the remote store.
    #[arg(long, conflicts_with_all = ["dry_run", "from_artifact"])]
    pub extract_only: bool,

    /// Sync from a previously written artifact instead of parsing the export.
    #[arg(long, value_name = "PATH")]
    pub from_artifact: Option<PathBuf>,

    /// Exit with a non-zero status if any single operation failed.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Write a default configuration file to the user config dir and exit.
    #[arg(long)]
    pub init_config: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.paths.input.clone_from(input);
        }
        if let Some(output) = &self.output {
            config.paths.output.clone_from(output);
        }
        if let Some(workers) = self.workers {
            config.sync.workers = workers;
        }
        if let Some(timeout) = self.timeout {
            config.sync.timeout_secs = timeout;
        }
        if self.fail_on_error {
            config.sync.fail_on_error = true;
        }
    }
}

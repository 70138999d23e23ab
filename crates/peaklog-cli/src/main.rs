//! peaklog CLI - Command-line interface for the peaklog mountain tracker
//!
//! Provides commands for:
//! - Managing mountains and their climbed status
//! - Listing and deleting GPX tracks
//! - Backup export/import and preset loading
//! - Duplicate cleanup and status
//!
//! The CLI works on the local collections only; remote sync needs a remote
//! store binding, which this binary does not ship.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use peaklog_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    backup::{ExportCommand, ImportCommand, PresetCommand},
    completions::CompletionsCommand,
    config::ConfigCommand,
    dedup::DedupCommand,
    mountain::MountainCommand,
    status::StatusCommand,
    track::TrackCommand,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "peaklog", version, about = "Offline-first mountain climbing log")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage mountains
    #[command(subcommand)]
    Mountain(MountainCommand),
    /// Manage GPX tracks
    #[command(subcommand)]
    Track(TrackCommand),
    /// Write a backup file with every mountain and track
    Export(ExportCommand),
    /// Merge a backup file into the local collections
    Import(ImportCommand),
    /// Replace the mountain list with a preset file
    Preset(PresetCommand),
    /// Collapse duplicate mountains
    Dedup(DedupCommand),
    /// Show collection and sync status
    Status(StatusCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    // Setup tracing: -v flags win over the configured level
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => config.logging.level.as_str(),
        (false, 1) => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_flags(cli.json, cli.quiet);

    match cli.command {
        Commands::Mountain(cmd) => cmd.execute(&config, format).await,
        Commands::Track(cmd) => cmd.execute(&config, format).await,
        Commands::Export(cmd) => cmd.execute(&config, format).await,
        Commands::Import(cmd) => cmd.execute(&config, format).await,
        Commands::Preset(cmd) => cmd.execute(&config, format).await,
        Commands::Dedup(cmd) => cmd.execute(&config, format).await,
        Commands::Status(cmd) => cmd.execute(&config, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
        Commands::Completions(cmd) => cmd.execute(format).await,
    }
}

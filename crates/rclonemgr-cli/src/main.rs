//! rclone-mgr CLI - Command-line interface for rclone-backed drives
//!
//! Provides commands for:
//! - Mounting, unmounting and listing drives
//! - Server-side copy and move between drives
//! - Watching a drive's journal and reacting to upload errors
//! - Asking a running daemon to copy files
//! - Setting drives up and inspecting the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    apply::ApplyCommand,
    completions::CompletionsCommand,
    config::ConfigCommand,
    journal::JournaldReaderCommand,
    ls::LsCommand,
    mount::{MountCommand, UmountCommand},
    request_copy::RequestCopyCommand,
    transfer::{CopyCommand, MoveCommand},
    CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "rclonemgr",
    version,
    about = "Manage Google Drive mounts using rclone"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(short = 'j', long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Mount drives (`all` mounts every configured drive)
    Mount(MountCommand),
    /// Unmount drives (`all` unmounts every configured drive)
    Umount(UmountCommand),
    /// List all available mounts and their status
    Ls(LsCommand),
    /// Copy files between drives on the server side
    Copy(CopyCommand),
    /// Move files between drives on the server side
    Move(MoveCommand),
    /// Follow a drive's journal and react to its errors
    JournaldReader(JournaldReaderCommand),
    /// Ask the daemon of a drive to copy files
    RequestCopy(RequestCopyCommand),
    /// Create remotes and units for a drive selection
    Apply(ApplyCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Log level for `-v` repetitions; `None` keeps the configured level
fn verbosity_level(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CommandContext::load(cli.config.clone(), format)?;

    // Setup tracing: RUST_LOG, then -v, then the configured level
    let level = verbosity_level(cli.verbose).unwrap_or(ctx.config.logging.level.as_str());
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Mount(cmd) => cmd.execute(&ctx).await,
        Commands::Umount(cmd) => cmd.execute(&ctx).await,
        Commands::Ls(cmd) => cmd.execute(&ctx).await,
        Commands::Copy(cmd) => cmd.execute(&ctx).await,
        Commands::Move(cmd) => cmd.execute(&ctx).await,
        Commands::JournaldReader(cmd) => cmd.execute(&ctx).await,
        Commands::RequestCopy(cmd) => cmd.execute(&ctx).await,
        Commands::Apply(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
        Commands::Completions(cmd) => cmd.execute(&ctx).await,
    }
}

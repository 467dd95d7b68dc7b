//! rclone-mgr daemon - Per-drive background service
//!
//! One instance runs per mounted drive (usually next to its
//! `rclone@<drive>.service` unit) and handles:
//! - Following the drive's journal and reacting to rclone errors
//! - The control socket used by file managers to request copies
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon starts the journal follower and the IPC server as separate
//! tasks, both driven by child tokens of a single `CancellationToken` that
//! is triggered on receipt of SIGTERM or SIGINT. If either task stops on
//! its own the daemon shuts down and exits with an error so that systemd
//! can restart it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rclonemgr_core::config::Config;
use rclonemgr_core::domain::sanitize_drive_name;
use rclonemgr_core::ports::{IDesktop, IProcessRunner};
use rclonemgr_core::usecases::{ErrorHandler, TransferOrchestrator};
use rclonemgr_ipc::{IpcServer, OrchestratorCopyHandler};
use rclonemgr_journal::{DriveWatcher, LogMonitor, WatchSummary};
use rclonemgr_process::{TokioProcessRunner, ZenityDesktop};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long an open remediation dialog may delay shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// rclone-mgr per-drive daemon
#[derive(Debug, Parser)]
#[command(name = "rclonemgrd", version, about)]
struct Args {
    /// Drive to watch, as used in `rclone@<drive>.service`
    drive: String,

    /// Path to the configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Loads the configuration named on the command line, or the default one
///
/// An explicit path must exist; the default path falls back to built-in
/// defaults.
fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let report = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::bail!("Invalid configuration: {report}");
    }
    Ok(config)
}

// ============================================================================
// DaemonService
// ============================================================================

/// Watches one drive and serves its control socket
struct DaemonService {
    drive_name: String,
    config: Config,
    runner: Arc<dyn IProcessRunner>,
    desktop: Arc<dyn IDesktop>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a service backed by real processes and zenity dialogs
    fn new(drive_name: &str, config: Config, shutdown: CancellationToken) -> Self {
        let desktop = Arc::new(ZenityDesktop::from_config(&config.dialogs));
        Self::with_adapters(
            drive_name,
            config,
            Arc::new(TokioProcessRunner::new()),
            desktop,
            shutdown,
        )
    }

    fn with_adapters(
        drive_name: &str,
        config: Config,
        runner: Arc<dyn IProcessRunner>,
        desktop: Arc<dyn IDesktop>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            drive_name: sanitize_drive_name(drive_name),
            config,
            runner,
            desktop,
            shutdown,
        }
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// Returns an error if the journal follower or the IPC server stopped
    /// before shutdown was requested.
    async fn run(&self) -> Result<()> {
        let drive = self.drive_name.clone();
        info!(drive = %drive, "Starting drive daemon");

        // Journal follower feeding the remediation flow
        let handler = Arc::new(ErrorHandler::new(
            Arc::clone(&self.desktop),
            Arc::new(self.config.ignore_rules.clone()),
            self.config.layout(),
        ));
        let monitor = LogMonitor::new(Arc::clone(&self.runner), self.config.journal.clone());
        let handle = monitor.start(&drive, self.shutdown.child_token());
        let watcher = DriveWatcher::new(drive.clone(), handler);

        let mut watch_task = {
            let shutdown = self.shutdown.clone();
            let drive = drive.clone();
            tokio::spawn(async move {
                let summary = watcher.run(handle).await;
                let stopped_early = !shutdown.is_cancelled();
                if stopped_early {
                    error!(drive = %drive, "Journal follower stopped, shutting down");
                    shutdown.cancel();
                }
                (summary, stopped_early)
            })
        };

        // Control socket for copy requests
        let orchestrator = Arc::new(TransferOrchestrator::from_config(
            Arc::clone(&self.runner),
            Arc::clone(&self.desktop),
            &self.config,
        ));
        let server = IpcServer::new(
            self.config.socket_path(&drive),
            Arc::new(OrchestratorCopyHandler::new(orchestrator)),
        );
        let server_task = {
            let shutdown = self.shutdown.clone();
            let token = self.shutdown.child_token();
            tokio::spawn(async move {
                let result = server.run(token).await;
                if !shutdown.is_cancelled() {
                    shutdown.cancel();
                }
                result
            })
        };

        self.shutdown.cancelled().await;
        info!(drive = %drive, "Shutdown requested, stopping tasks");

        server_task
            .await
            .context("IPC server task panicked")?
            .context("IPC server failed")?;

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut watch_task).await {
            Ok(joined) => {
                let (summary, stopped_early): (WatchSummary, bool) =
                    joined.context("Drive watcher task panicked")?;
                info!(drive = %drive, ?summary, "Drive watcher stopped");
                if stopped_early {
                    anyhow::bail!("Journal follower for drive '{drive}' stopped unexpectedly");
                }
            }
            Err(_) => {
                warn!(drive = %drive, "Drive watcher still busy after grace period, aborting");
                watch_task.abort();
            }
        }

        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
        _ = token.cancelled() => {
            return;
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(drive = %args.drive, "rclone-mgr daemon starting (rclonemgrd)");

    // Create cancellation token for propagation to all tasks
    let shutdown_token = CancellationToken::new();

    // Spawn signal handler task
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(&args.drive, config, shutdown_token);
    let result = service.run().await;

    match &result {
        Ok(()) => info!("rclone-mgr daemon shut down gracefully"),
        Err(e) => error!(error = %e, "rclone-mgr daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

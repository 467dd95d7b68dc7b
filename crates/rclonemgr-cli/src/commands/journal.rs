//! Journald reader command - Watch one drive in the foreground
//!
//! `rclonemgr journald-reader <drive>` follows the journal of
//! `rclone@<drive>.service` and reacts to its errors with desktop dialogs,
//! the same way the daemon does, until Ctrl+C.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use rclonemgr_core::domain::sanitize_drive_name;
use rclonemgr_core::usecases::ErrorHandler;
use rclonemgr_journal::{DriveWatcher, LogMonitor, WatchSummary};
use rclonemgr_process::{TokioProcessRunner, ZenityDesktop};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::CommandContext;

/// Follow a drive's journal and react to its errors
#[derive(Debug, Args)]
pub struct JournaldReaderCommand {
    /// Drive to watch, as used in `rclone@<drive>.service`
    pub drive: String,
}

impl JournaldReaderCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let drive = sanitize_drive_name(&self.drive);
        let handler = Arc::new(ErrorHandler::new(
            Arc::new(ZenityDesktop::from_config(&ctx.config.dialogs)),
            Arc::new(ctx.config.ignore_rules.clone()),
            ctx.config.layout(),
        ));
        let monitor = LogMonitor::new(Arc::new(TokioProcessRunner::new()), ctx.config.journal.clone());

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, stopping journal reader"),
                Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
            }
            stop.cancel();
        });

        let handle = monitor.start(&drive, cancel.clone());
        let summary = DriveWatcher::new(drive.clone(), handler).run(handle).await;

        report(ctx, &drive, &summary);
        if !cancel.is_cancelled() && summary.errors > 0 {
            anyhow::bail!("Journal reader for drive '{drive}' stopped with errors");
        }
        Ok(())
    }
}

fn report(ctx: &CommandContext, drive: &str, summary: &WatchSummary) {
    let formatter = ctx.formatter();
    formatter.success(&format!("Stopped watching drive {drive}"));
    formatter.info(&format!(
        "{} entries read, {} errors reported, {} files moved, {} reader errors",
        summary.entries, summary.notified, summary.relocated, summary.errors
    ));
    formatter.print_value(&serde_json::json!({
        "drive": drive,
        "entries": summary.entries,
        "notified": summary.notified,
        "relocated": summary.relocated,
        "errors": summary.errors,
    }));
}

//! Per-drive consumer of the journal follower
//!
//! Feeds every entry to the [`ErrorHandler`] and logs monitor errors. An
//! entry is fully remediated, dialogs included, before the next one is
//! read, so a drive never has two dialog sequences on screen at once.

use std::sync::Arc;

use rclonemgr_core::usecases::{ErrorHandler, Remediation};
use tracing::{debug, error, info, warn};

use crate::monitor::{MonitorError, MonitorHandle};

/// Counters reported when a watcher finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub entries: usize,
    pub notified: usize,
    pub relocated: usize,
    pub errors: usize,
}

/// Watches one drive's journal and reacts to its errors
pub struct DriveWatcher {
    drive_name: String,
    handler: Arc<ErrorHandler>,
}

impl DriveWatcher {
    pub fn new(drive_name: impl Into<String>, handler: Arc<ErrorHandler>) -> Self {
        Self {
            drive_name: drive_name.into(),
            handler,
        }
    }

    /// Consumes the monitor's channels until both are closed
    pub async fn run(&self, handle: MonitorHandle) -> WatchSummary {
        let MonitorHandle {
            mut entries,
            mut errors,
            ..
        } = handle;
        let mut summary = WatchSummary::default();

        loop {
            tokio::select! {
                Some(entry) = entries.recv() => {
                    summary.entries += 1;
                    match self.handler.handle_entry(&entry, &self.drive_name).await {
                        Remediation::Notified => summary.notified += 1,
                        Remediation::Relocated { .. } => summary.relocated += 1,
                        Remediation::Ignored => {}
                        other => debug!(drive = %self.drive_name, outcome = ?other, "Entry handled"),
                    }
                }
                Some(err) = errors.recv() => {
                    summary.errors += 1;
                    self.log_error(&err);
                }
                else => break,
            }
        }

        info!(drive = %self.drive_name, ?summary, "Drive watcher finished");
        summary
    }

    fn log_error(&self, err: &MonitorError) {
        match err {
            MonitorError::Decode { line, .. } => {
                warn!(drive = %self.drive_name, error = %err, line = %line, "Skipping journal line");
            }
            MonitorError::Spawn(_) | MonitorError::Read(_) | MonitorError::Exited(_) => {
                error!(drive = %self.drive_name, error = %err, "Journal reader failed");
            }
        }
    }
}

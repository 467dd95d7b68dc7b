//! rclone-mgr Journal - Following rclone's journal
//!
//! ## Modules
//!
//! - [`monitor`] - `journalctl` follower producing decoded entries
//! - [`watcher`] - Per-drive loop feeding entries to the error handler

pub mod monitor;
pub mod watcher;

pub use monitor::{LogMonitor, MonitorError, MonitorHandle, MonitorState};
pub use watcher::{DriveWatcher, WatchSummary};

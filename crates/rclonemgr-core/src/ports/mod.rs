//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the core depends on, but whose implementations
//! live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IProcessRunner`] - Subprocesses read line by line (rclone, journalctl)
//! - [`IDesktop`] - Blocking dialogs, pickers and progress bars
//! - [`IUnitManager`] - systemd user units that mount the drives
//! - [`IRemoteConfig`] - rclone remote configuration

pub mod desktop;
pub mod process;
pub mod remotes;
pub mod units;

pub use desktop::{CancelCallback, DialogError, IDesktop, IProgressHandle};
pub use process::{IProcessRunner, IRunningProcess, OutputStream, ProcessError, ProcessExit, ProcessSpec};
pub use remotes::{IRemoteConfig, RemoteCredentials};
pub use units::{IUnitManager, UnitStatus};

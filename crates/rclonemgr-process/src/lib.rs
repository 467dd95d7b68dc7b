//! rclone-mgr Process - Subprocess adapters
//!
//! Implements the core's driven ports by running external programs:
//!
//! ## Modules
//!
//! - [`runner`] - tokio process runner streaming stdout or stderr line by line
//! - [`zenity`] - Error/info dialogs, file pickers and progress bars
//! - [`systemd`] - `systemctl --user` unit lifecycle and status
//! - [`rclone`] - `rclone listremotes` and `rclone config create|delete`

pub mod rclone;
pub mod runner;
pub mod systemd;
pub mod zenity;

pub use rclone::RcloneRemoteConfig;
pub use runner::TokioProcessRunner;
pub use systemd::SystemctlUnitManager;
pub use zenity::ZenityDesktop;

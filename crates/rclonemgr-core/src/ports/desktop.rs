//! Desktop interaction port (driven/secondary port)
//!
//! Dialogs are blocking from the user's point of view: each call resolves
//! once the dialog has been dismissed. Only the task that opened a dialog
//! waits on it, so the log monitor keeps running while a picker is open.
//!
//! ## Design Notes
//!
//! - A dismissed picker is reported as [`DialogError::Cancelled`], which
//!   callers treat as a silent abort rather than a failure.
//! - The progress dialog reports cancellation through a callback registered
//!   with [`IProgressHandle::on_cancelled`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by dialog implementations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// The user closed or cancelled the dialog
    #[error("dialog was cancelled by the user")]
    Cancelled,

    /// The dialog could not be shown or exited abnormally
    #[error("dialog failed: {0}")]
    Failed(String),
}

/// Invoked once when the user cancels a progress dialog
pub type CancelCallback = Box<dyn FnOnce() + Send + 'static>;

/// A progress dialog that is currently on screen
#[async_trait::async_trait]
pub trait IProgressHandle: Send {
    /// Moves the bar to `percent` (0..=100)
    async fn set_percent(&mut self, percent: u8) -> Result<(), DialogError>;

    /// Registers the callback run when the user cancels the dialog
    fn on_cancelled(&mut self, callback: CancelCallback);

    /// Closes the dialog's input; the dialog goes away on its own
    async fn close(self: Box<Self>) -> Result<(), DialogError>;
}

/// Port trait for user-facing dialogs
#[async_trait::async_trait]
pub trait IDesktop: Send + Sync {
    /// Shows an error dialog and waits for it to be dismissed
    async fn show_error(&self, title: &str, message: &str) -> Result<(), DialogError>;

    /// Shows an informational dialog and waits for it to be dismissed
    async fn show_info(&self, title: &str, message: &str) -> Result<(), DialogError>;

    /// Asks the user for a directory; `Ok(None)` if nothing was selected
    async fn pick_directory(&self, title: &str) -> Result<Option<PathBuf>, DialogError>;

    /// Asks the user where to save a file, pre-filled with `suggested_name`
    async fn pick_save_file(
        &self,
        title: &str,
        text: &str,
        suggested_name: &str,
    ) -> Result<Option<PathBuf>, DialogError>;

    /// Opens a progress dialog at 0%
    async fn show_progress(
        &self,
        title: &str,
        text: &str,
    ) -> Result<Box<dyn IProgressHandle>, DialogError>;
}

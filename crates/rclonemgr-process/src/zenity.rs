//! zenity dialogs
//!
//! Implements [`IDesktop`] by running a zenity-compatible program per
//! dialog. zenity exits with 0 on OK and 1 on Cancel or when the window is
//! closed; anything else, or a failed start, is a [`DialogError::Failed`].

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use rclonemgr_core::config::DialogsConfig;
use rclonemgr_core::ports::{CancelCallback, DialogError, IDesktop, IProgressHandle};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// zenity's exit code for Cancel / window closed
const CANCEL_EXIT_CODE: i32 = 1;

/// Dialogs shown through zenity
#[derive(Debug, Clone)]
pub struct ZenityDesktop {
    binary: String,
}

impl Default for ZenityDesktop {
    fn default() -> Self {
        Self::from_config(&DialogsConfig::default())
    }
}

impl ZenityDesktop {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &DialogsConfig) -> Self {
        Self::new(config.binary.clone())
    }

    /// Runs one dialog to completion and returns its trimmed stdout
    async fn run(&self, args: Vec<String>) -> Result<String, DialogError> {
        debug!(binary = %self.binary, ?args, "Showing dialog");
        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DialogError::Failed(format!("failed to start {}: {e}", self.binary)))?;

        check_status(output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Message dialogs: being closed instead of confirmed is not an error
    async fn message(&self, kind: &str, title: &str, message: &str) -> Result<(), DialogError> {
        match self.run(message_args(kind, title, message)).await {
            Ok(_) | Err(DialogError::Cancelled) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn check_status(status: ExitStatus) -> Result<(), DialogError> {
    match status.code() {
        Some(0) => Ok(()),
        Some(CANCEL_EXIT_CODE) => Err(DialogError::Cancelled),
        _ => Err(DialogError::Failed(format!("dialog exited with {status}"))),
    }
}

fn message_args(kind: &str, title: &str, message: &str) -> Vec<String> {
    vec![
        format!("--{kind}"),
        format!("--title={title}"),
        format!("--text={message}"),
        "--no-markup".to_string(),
    ]
}

fn directory_args(title: &str) -> Vec<String> {
    vec![
        "--file-selection".to_string(),
        "--directory".to_string(),
        format!("--title={title}"),
    ]
}

fn save_file_args(title: &str, suggested_name: &str) -> Vec<String> {
    vec![
        "--file-selection".to_string(),
        "--save".to_string(),
        "--confirm-overwrite".to_string(),
        format!("--title={title}"),
        format!("--filename={suggested_name}"),
    ]
}

fn progress_args(title: &str, text: &str) -> Vec<String> {
    vec![
        "--progress".to_string(),
        format!("--title={title}"),
        format!("--text={text}"),
        "--percentage=0".to_string(),
        "--auto-close".to_string(),
    ]
}

/// An empty selection means the dialog was confirmed without a choice
fn selected_path(stdout: String) -> Option<PathBuf> {
    if stdout.is_empty() {
        None
    } else {
        Some(PathBuf::from(stdout))
    }
}

#[async_trait::async_trait]
impl IDesktop for ZenityDesktop {
    async fn show_error(&self, title: &str, message: &str) -> Result<(), DialogError> {
        self.message("error", title, message).await
    }

    async fn show_info(&self, title: &str, message: &str) -> Result<(), DialogError> {
        self.message("info", title, message).await
    }

    async fn pick_directory(&self, title: &str) -> Result<Option<PathBuf>, DialogError> {
        self.run(directory_args(title)).await.map(selected_path)
    }

    /// zenity's file chooser has no body text, so only the title is shown
    async fn pick_save_file(
        &self,
        title: &str,
        _text: &str,
        suggested_name: &str,
    ) -> Result<Option<PathBuf>, DialogError> {
        self.run(save_file_args(title, suggested_name))
            .await
            .map(selected_path)
    }

    async fn show_progress(
        &self,
        title: &str,
        text: &str,
    ) -> Result<Box<dyn IProgressHandle>, DialogError> {
        let mut child = Command::new(&self.binary)
            .args(progress_args(title, text))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| DialogError::Failed(format!("failed to start {}: {e}", self.binary)))?;
        let stdin = child.stdin.take();

        let cancelled = CancellationToken::new();
        let token = cancelled.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.code() == Some(CANCEL_EXIT_CODE) => {
                    info!("Progress dialog cancelled by user");
                    token.cancel();
                }
                Ok(status) => debug!(%status, "Progress dialog exited"),
                Err(e) => warn!(error = %e, "Failed to wait for progress dialog"),
            }
        });

        Ok(Box::new(ZenityProgress {
            stdin,
            cancelled,
            closed: CancellationToken::new(),
        }))
    }
}

/// A running `zenity --progress`, fed percentages on stdin
struct ZenityProgress {
    stdin: Option<ChildStdin>,
    cancelled: CancellationToken,
    closed: CancellationToken,
}

#[async_trait::async_trait]
impl IProgressHandle for ZenityProgress {
    async fn set_percent(&mut self, percent: u8) -> Result<(), DialogError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DialogError::Failed("progress dialog has no input".to_string()))?;
        let line = format!("{}\n", percent.min(100));
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DialogError::Failed(format!("failed to update progress: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| DialogError::Failed(format!("failed to update progress: {e}")))
    }

    fn on_cancelled(&mut self, callback: CancelCallback) {
        let cancelled = self.cancelled.clone();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => callback(),
                _ = closed.cancelled() => {}
            }
        });
    }

    async fn close(self: Box<Self>) -> Result<(), DialogError> {
        // dropping stdin lets zenity finish on its own
        self.closed.cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_args() {
        assert_eq!(
            message_args("error", "Drive Error: team", "boom & bust"),
            vec![
                "--error",
                "--title=Drive Error: team",
                "--text=boom & bust",
                "--no-markup"
            ]
        );
    }

    #[test]
    fn test_picker_args() {
        assert_eq!(
            directory_args("Pick"),
            vec!["--file-selection", "--directory", "--title=Pick"]
        );
        assert_eq!(
            save_file_args("Select File Location", "report.txt"),
            vec![
                "--file-selection",
                "--save",
                "--confirm-overwrite",
                "--title=Select File Location",
                "--filename=report.txt"
            ]
        );
        assert_eq!(
            progress_args("Copy on Google Drive", "Copying files..."),
            vec![
                "--progress",
                "--title=Copy on Google Drive",
                "--text=Copying files...",
                "--percentage=0",
                "--auto-close"
            ]
        );
    }

    #[test]
    fn test_selected_path() {
        assert_eq!(selected_path(String::new()), None);
        assert_eq!(
            selected_path("/home/me/file.txt".to_string()),
            Some(PathBuf::from("/home/me/file.txt"))
        );
    }

    #[tokio::test]
    async fn test_exit_codes_map_to_outcomes() {
        // `true` and `false` ignore their arguments and answer OK and Cancel
        let ok = ZenityDesktop::new("true");
        assert_eq!(ok.pick_directory("x").await, Ok(None));
        assert_eq!(ok.show_error("t", "m").await, Ok(()));

        let cancelled = ZenityDesktop::new("false");
        assert_eq!(cancelled.pick_directory("x").await, Err(DialogError::Cancelled));
        assert_eq!(cancelled.show_info("t", "m").await, Ok(()));

        let missing = ZenityDesktop::new("/nonexistent/zenity");
        assert!(matches!(
            missing.pick_directory("x").await,
            Err(DialogError::Failed(_))
        ));
    }
}

//! Bulk copy/move use case
//!
//! Runs rclone once per source, server-side, between paths under the mount
//! root. Progress is reported by counting rclone's per-file completion lines
//! against the number of regular files found under the sources beforehand.
//! The user can cancel from the progress dialog; cancellation stops the
//! running rclone and skips the remaining sources.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, RcloneConfig};
use crate::domain::paths::absolutize;
use crate::domain::{
    is_completion_marker, is_subdirectory, patch_destination_for_directory_source,
    to_remote_coordinate, DomainError, TransferJob, TransferOp,
};
use crate::ports::{
    DialogError, IDesktop, IProcessRunner, IProgressHandle, IRunningProcess, OutputStream,
    ProcessError, ProcessExit, ProcessSpec,
};

/// Title of the result dialogs
const RESULT_TITLE: &str = "Google Drive";

/// Why a transfer stopped early
///
/// The `Display` text of each variant is what the user sees in the error dialog.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Failed to resolve Google Drive root")]
    ResolveRoot(#[source] DomainError),

    #[error("Destination must be inside your Google Drive mount")]
    DestinationOutsideRoot(PathBuf),

    #[error("Source must be inside your Google Drive mount")]
    SourceOutsideRoot(PathBuf),

    #[error("Failed to parse source path")]
    ParseSource(PathBuf),

    #[error("Failed to parse destination path")]
    ParseDestination(PathBuf),

    #[error("No source files provided")]
    NoFiles,

    #[error("No destination directory selected")]
    NoDestination,

    #[error("Failed to select destination: {0}")]
    DestinationPicker(#[source] DialogError),

    #[error("Failed to start progress bar: {0}")]
    Progress(#[source] DialogError),

    #[error("Failed to run rclone {op}: {source}")]
    Process {
        op: TransferOp,
        #[source]
        source: ProcessError,
    },

    #[error("Failed to {op} {}: rclone finished with {status}", .path.display())]
    ProcessFailed {
        op: TransferOp,
        path: PathBuf,
        status: ProcessExit,
    },
}

/// How a transfer ended
#[derive(Debug)]
pub enum TransferOutcome {
    /// Every source went through
    Completed { files_done: u64, files_total: u64 },
    /// The user cancelled; `sources_done` sources had finished before that
    Cancelled { sources_done: usize },
    /// Stopped on an error that was already shown to the user
    Failed(TransferError),
}

impl TransferOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }
}

/// Use case for bulk copies and moves inside the mount root
///
/// Holds no per-job state, so one orchestrator can run several jobs
/// concurrently through [`TransferOrchestrator::spawn`].
pub struct TransferOrchestrator {
    runner: Arc<dyn IProcessRunner>,
    desktop: Arc<dyn IDesktop>,
    mount_root: PathBuf,
    rclone: RcloneConfig,
}

impl TransferOrchestrator {
    /// Creates an orchestrator with the default rclone invocation
    ///
    /// # Arguments
    ///
    /// * `runner` - Starts the rclone processes
    /// * `desktop` - Shows the progress bar and the result dialogs
    /// * `mount_root` - Directory holding one mount point per drive
    pub fn new(
        runner: Arc<dyn IProcessRunner>,
        desktop: Arc<dyn IDesktop>,
        mount_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            desktop,
            mount_root: mount_root.into(),
            rclone: RcloneConfig::default(),
        }
    }

    /// Creates an orchestrator from the loaded configuration
    pub fn from_config(
        runner: Arc<dyn IProcessRunner>,
        desktop: Arc<dyn IDesktop>,
        config: &Config,
    ) -> Self {
        Self {
            runner,
            desktop,
            mount_root: config.layout().root().to_path_buf(),
            rclone: config.rclone.clone(),
        }
    }

    /// Overrides the rclone binary and the flags passed to every transfer
    pub fn with_rclone(mut self, rclone: RcloneConfig) -> Self {
        self.rclone = rclone;
        self
    }

    /// Runs a transfer on its own task
    pub fn spawn(
        self: Arc<Self>,
        op: TransferOp,
        sources: Vec<PathBuf>,
        destination: PathBuf,
    ) -> JoinHandle<TransferOutcome> {
        tokio::spawn(async move { self.run(op, sources, destination).await })
    }

    /// Asks the user for a destination directory, then runs the transfer
    ///
    /// Dismissing the picker ends the request silently.
    pub async fn select_destination_and_run(
        &self,
        op: TransferOp,
        sources: Vec<PathBuf>,
    ) -> TransferOutcome {
        let title = format!("Select destination directory for {}", op.progressive().to_lowercase());
        match self.desktop.pick_directory(&title).await {
            Ok(Some(destination)) => self.run(op, sources, destination).await,
            Ok(None) => self.fail(TransferError::NoDestination).await,
            Err(DialogError::Cancelled) => {
                info!(%op, "Destination picker dismissed, nothing to do");
                TransferOutcome::Cancelled { sources_done: 0 }
            }
            Err(e) => self.fail(TransferError::DestinationPicker(e)).await,
        }
    }

    /// Copies or moves every source into `destination`
    ///
    /// Errors are shown to the user before they are returned in
    /// [`TransferOutcome::Failed`]; a completed transfer shows a success dialog.
    ///
    /// # Arguments
    ///
    /// * `op` - Copy or move
    /// * `sources` - Files or directories under the mount root
    /// * `destination` - Directory under the mount root
    pub async fn run(
        &self,
        op: TransferOp,
        sources: Vec<PathBuf>,
        destination: PathBuf,
    ) -> TransferOutcome {
        info!(
            %op,
            sources = sources.len(),
            destination = %destination.display(),
            "Starting transfer"
        );

        match self.execute(op, sources, destination).await {
            Ok(outcome @ TransferOutcome::Completed { .. }) => {
                info!(%op, ?outcome, "Transfer finished");
                if let Err(e) = self.desktop.show_info(RESULT_TITLE, op.success_message()).await {
                    warn!(error = %e, "Failed to show success dialog");
                }
                outcome
            }
            Ok(outcome) => {
                info!(%op, ?outcome, "Transfer cancelled by user");
                outcome
            }
            Err(e) => self.fail(e).await,
        }
    }

    async fn fail(&self, err: TransferError) -> TransferOutcome {
        error!(error = %err, "Transfer failed");
        if let Err(e) = self.desktop.show_error(RESULT_TITLE, &err.to_string()).await {
            warn!(error = %e, "Failed to show error dialog");
        }
        TransferOutcome::Failed(err)
    }

    async fn execute(
        &self,
        op: TransferOp,
        sources: Vec<PathBuf>,
        destination: PathBuf,
    ) -> Result<TransferOutcome, TransferError> {
        let root = absolutize(&self.mount_root).map_err(TransferError::ResolveRoot)?;
        let destination = absolutize(&destination)
            .map_err(|_| TransferError::DestinationOutsideRoot(destination.clone()))?;
        if !is_subdirectory(&root, &destination).map_err(TransferError::ResolveRoot)? {
            return Err(TransferError::DestinationOutsideRoot(destination));
        }

        let files_total = count_files(&sources).await;
        debug!(files_total, "Counted files to transfer");
        if files_total == 0 {
            return Err(TransferError::NoFiles);
        }

        let mut job = TransferJob::new(op, sources, destination, files_total);

        let mut progress = self
            .desktop
            .show_progress(&progress_title(op), &progress_text(op))
            .await
            .map_err(TransferError::Progress)?;
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        progress.on_cancelled(Box::new(move || token.cancel()));

        let result = self
            .transfer_sources(&mut job, &root, progress.as_mut(), &cancel)
            .await;

        if let Err(e) = progress.close().await {
            warn!(error = %e, "Failed to close progress dialog");
        }
        result
    }

    async fn transfer_sources(
        &self,
        job: &mut TransferJob,
        root: &Path,
        progress: &mut dyn IProgressHandle,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome, TransferError> {
        let op = job.operation();
        let sources = job.sources().to_vec();

        for (index, source) in sources.iter().enumerate() {
            if cancel.is_cancelled() {
                return Ok(TransferOutcome::Cancelled {
                    sources_done: index,
                });
            }

            let spec = self.command_for(op, root, source, job.destination()).await?;
            info!(%op, source = %source.display(), command = %spec, "Running rclone");

            let mut process = self
                .runner
                .spawn(&spec)
                .await
                .map_err(|source| TransferError::Process { op, source })?;

            if !stream_progress(process.as_mut(), job, progress, cancel).await? {
                if let Err(e) = process.kill().await {
                    warn!(error = %e, "Failed to stop rclone after cancellation");
                }
                return Ok(TransferOutcome::Cancelled {
                    sources_done: index,
                });
            }

            let status = process
                .wait()
                .await
                .map_err(|source| TransferError::Process { op, source })?;
            if !status.success() {
                return Err(TransferError::ProcessFailed {
                    op,
                    path: source.clone(),
                    status,
                });
            }
            debug!(source = %source.display(), files_done = job.files_done(), "Source finished");
        }

        Ok(TransferOutcome::Completed {
            files_done: job.files_done(),
            files_total: job.files_total(),
        })
    }

    /// Builds `rclone <op> <flags> <src> <dst> -v` for one source
    async fn command_for(
        &self,
        op: TransferOp,
        root: &Path,
        source: &Path,
        destination: &Path,
    ) -> Result<ProcessSpec, TransferError> {
        let absolute = absolutize(source)
            .map_err(|_| TransferError::SourceOutsideRoot(source.to_path_buf()))?;
        if !is_subdirectory(root, &absolute).map_err(TransferError::ResolveRoot)? {
            return Err(TransferError::SourceOutsideRoot(absolute));
        }

        let remote_source = to_remote_coordinate(root, &absolute)
            .map_err(|_| TransferError::ParseSource(absolute.clone()))?;
        let mut remote_destination = to_remote_coordinate(root, destination)
            .map_err(|_| TransferError::ParseDestination(destination.to_path_buf()))?
            .to_string();

        // rclone copies a directory's contents, not the directory itself
        let is_dir = tokio::fs::metadata(&absolute)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if is_dir {
            remote_destination =
                patch_destination_for_directory_source(remote_source.subpath(), &remote_destination);
        }

        Ok(ProcessSpec::new(&self.rclone.binary)
            .arg(op.as_str())
            .args(self.rclone.transfer_flags.iter().cloned())
            .arg(remote_source.to_string())
            .arg(remote_destination)
            .arg("-v")
            .stream(OutputStream::Stderr))
    }
}

/// `Copy on Google Drive` / `Move on Google Drive`
pub fn progress_title(op: TransferOp) -> String {
    format!("{} on Google Drive", op.title())
}

/// `Copying files...` / `Moving files...`
pub fn progress_text(op: TransferOp) -> String {
    format!("{} files...", op.progressive())
}

/// Feeds rclone's diagnostics into the job until the stream ends
///
/// Returns `false` if the user cancelled while the process was running.
async fn stream_progress(
    process: &mut dyn IRunningProcess,
    job: &mut TransferJob,
    progress: &mut dyn IProgressHandle,
    cancel: &CancellationToken,
) -> Result<bool, TransferError> {
    let op = job.operation();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            line = process.next_line() => Some(line),
        };

        let line = match next {
            None => return Ok(false),
            Some(Ok(Some(line))) => line,
            Some(Ok(None)) => return Ok(true),
            Some(Err(source)) => return Err(TransferError::Process { op, source }),
        };

        debug!(target: "rclone", "{line}");
        if is_completion_marker(&line) {
            let percent = job.record_completion();
            if let Err(e) = progress.set_percent(percent).await {
                warn!(error = %e, percent, "Failed to update progress bar");
            }
        }
    }
}

/// Number of non-directory entries under all sources
///
/// Sources that do not exist count as zero.
async fn count_files(sources: &[PathBuf]) -> u64 {
    let sources = sources.to_vec();
    let counted = tokio::task::spawn_blocking(move || {
        sources.iter().map(|source| count_files_under(source)).sum::<u64>()
    })
    .await;
    match counted {
        Ok(total) => total,
        Err(e) => {
            warn!(error = %e, "File counting task failed");
            0
        }
    }
}

fn count_files_under(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| !entry.file_type().is_dir())
        .count() as u64
}

//! Journal error remediation use case
//!
//! Decides what to do with one journal entry of a drive's rclone unit:
//! ignore it, tell the user about it, or walk the user through moving a
//! file that rclone will never manage to upload.
//!
//! ## Remediation flow
//!
//! ```text
//! entry ──► suppressed? ──yes──► Ignored
//!              │no
//!              ▼
//!        permission-denied upload? ──no──► error dialog ──► Notified
//!              │yes
//!              ▼
//!        file still in the mount? ──no──► Abandoned
//!              │yes
//!              ▼
//!        warn ─► save-as picker ─► relocate ─► Relocated / RelocationFailed
//! ```

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};

use crate::domain::paths::{absolutize, is_subdirectory};
use crate::domain::{
    extract_file_name, should_trigger_file_move, IgnoreRuleSet, LogEntry, MountLayout,
};
use crate::ports::{DialogError, IDesktop};

const SELECT_LOCATION_TITLE: &str = "Select File Location";
const MOVE_FAILED_TITLE: &str = "Error Moving File";
const MOVED_TITLE: &str = "File Moved";

/// Errors raised while relocating a file out of the mount
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// The chosen destination is an existing directory
    #[error("{} is a directory.\n\nYou can't replace a file with a directory!", .0.display())]
    DestinationIsDirectory(PathBuf),

    /// The chosen destination is the stranded file itself
    #[error("{} is the file being moved.\n\nPick a location outside the drive.", .0.display())]
    SameFile(PathBuf),

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RecoveryError {
    fn io<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> Self + 'a {
        move |source| RecoveryError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Why a relocation was not attempted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbandonReason {
    /// The log line did not name a file
    NoFileName,
    /// The file name escapes the drive directory
    OutsideDrive(PathBuf),
    /// The file is no longer in the mount
    FileGone,
    /// The user dismissed the save-as picker
    PickerCancelled,
    /// The picker returned without a path
    NoDestination,
    /// The picker could not be shown
    PickerFailed(DialogError),
}

/// What [`ErrorHandler::handle_entry`] did with an entry
#[derive(Debug)]
pub enum Remediation {
    /// Not an error, or matched a suppression rule
    Ignored,
    /// Shown to the user as an error dialog
    Notified,
    /// A relocation was needed but did not happen
    Abandoned(AbandonReason),
    /// The file was moved out of the mount
    Relocated { from: PathBuf, to: PathBuf },
    /// The move was attempted and failed; the user has been told
    RelocationFailed(RecoveryError),
}

/// Use case turning journal errors into user interactions
///
/// Entries for one drive are meant to be handled one at a time, so at most
/// one dialog sequence per drive is on screen.
pub struct ErrorHandler {
    desktop: Arc<dyn IDesktop>,
    rules: Arc<IgnoreRuleSet>,
    layout: MountLayout,
}

impl ErrorHandler {
    /// Creates a new ErrorHandler
    ///
    /// # Arguments
    ///
    /// * `desktop` - Dialogs and pickers
    /// * `rules` - Suppression rules, fixed for the lifetime of the handler
    /// * `layout` - Where drives are mounted, to locate files named in log lines
    pub fn new(desktop: Arc<dyn IDesktop>, rules: Arc<IgnoreRuleSet>, layout: MountLayout) -> Self {
        Self {
            desktop,
            rules,
            layout,
        }
    }

    /// Classifies one entry and runs the matching remediation
    ///
    /// Never fails: dialog problems are logged and the entry is considered handled.
    pub async fn handle_entry(&self, entry: &LogEntry, drive_name: &str) -> Remediation {
        if !self.rules.should_trigger_error(entry, drive_name) {
            debug!(drive = drive_name, message = %entry.message, "Entry ignored");
            return Remediation::Ignored;
        }

        if should_trigger_file_move(entry) {
            return self.request_file_move(entry, drive_name).await;
        }

        warn!(drive = drive_name, message = %entry.message, "rclone reported an error");
        let message = format!("The following error occurred:\n\n{}", entry.message);
        self.show_error(&drive_error_title(drive_name), &message).await;
        Remediation::Notified
    }

    async fn request_file_move(&self, entry: &LogEntry, drive_name: &str) -> Remediation {
        let file_name = extract_file_name(entry);
        if file_name.is_empty() {
            warn!(drive = drive_name, message = %entry.message, "Upload refused but no file name in log line");
            return Remediation::Abandoned(AbandonReason::NoFileName);
        }

        let file_path = self.layout.file_path(drive_name, &file_name);
        let drive_path = self.layout.drive_path(drive_name);
        if !is_strictly_inside(&drive_path, &file_path) {
            warn!(drive = drive_name, file = %file_name, "File name from log line points outside the drive");
            return Remediation::Abandoned(AbandonReason::OutsideDrive(file_path));
        }
        if tokio::fs::metadata(&file_path).await.is_err() {
            debug!(path = %file_path.display(), "File already gone, nothing to relocate");
            return Remediation::Abandoned(AbandonReason::FileGone);
        }

        warn!(
            drive = drive_name,
            path = %file_path.display(),
            "Upload refused for insufficient parent permissions"
        );
        let message = format!(
            "You have insufficient permissions to write a file:\n\n- {}\n\n\
             Make sure to move the file you just created to another location immediately!",
            file_path.display()
        );
        self.show_error(&drive_error_title(drive_name), &message).await;

        let suggested = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        let text = format!("Select a new location for the file:\n\n{}", file_path.display());
        let destination = match self
            .desktop
            .pick_save_file(SELECT_LOCATION_TITLE, &text, &suggested)
            .await
        {
            Ok(Some(path)) => path,
            Ok(None) => {
                info!("No file selected, skipping");
                return Remediation::Abandoned(AbandonReason::NoDestination);
            }
            Err(DialogError::Cancelled) => {
                info!("File selector was cancelled, skipping");
                return Remediation::Abandoned(AbandonReason::PickerCancelled);
            }
            Err(e) => {
                error!(error = %e, "Failed to show file selector");
                return Remediation::Abandoned(AbandonReason::PickerFailed(e));
            }
        };

        match relocate_file(&file_path, &destination).await {
            Ok(()) => {
                info!(from = %file_path.display(), to = %destination.display(), "File relocated");
                let message = format!("File moved to:\n\n{}", destination.display());
                if let Err(e) = self.desktop.show_info(MOVED_TITLE, &message).await {
                    warn!(error = %e, "Failed to show info dialog");
                }
                Remediation::Relocated {
                    from: file_path,
                    to: destination,
                }
            }
            Err(e) => {
                error!(error = %e, from = %file_path.display(), "Failed to relocate file");
                let message = format!("Failed to move file:\n\n{e}");
                self.show_error(MOVE_FAILED_TITLE, &message).await;
                Remediation::RelocationFailed(e)
            }
        }
    }

    async fn show_error(&self, title: &str, message: &str) {
        if let Err(e) = self.desktop.show_error(title, message).await {
            warn!(error = %e, "Failed to show error dialog");
        }
    }
}

fn is_strictly_inside(drive_path: &Path, file_path: &Path) -> bool {
    match (absolutize(drive_path), absolutize(file_path)) {
        (Ok(drive), Ok(file)) => file != drive && is_subdirectory(&drive, &file).unwrap_or(false),
        _ => false,
    }
}

fn drive_error_title(drive_name: &str) -> String {
    format!("Drive Error: {drive_name}")
}

/// Moves a file by copying it and removing the original
///
/// Works across filesystems, which a rename out of a FUSE mount does not.
/// The destination gets the source's permission bits; an existing regular
/// file at `dest` is overwritten. The source is removed only after the copy
/// has been flushed and both files are closed.
///
/// # Errors
///
/// Returns [`RecoveryError::DestinationIsDirectory`] if `dest` is a directory
/// and [`RecoveryError::SameFile`] if `dest` is `src` itself. The source is
/// left untouched in both cases.
pub async fn relocate_file(src: &Path, dest: &Path) -> Result<(), RecoveryError> {
    let mut input = tokio::fs::File::open(src)
        .await
        .map_err(RecoveryError::io("open", src))?;
    let permissions = input
        .metadata()
        .await
        .map_err(RecoveryError::io("read metadata of", src))?
        .permissions();

    if let Ok(meta) = tokio::fs::metadata(dest).await {
        if meta.is_dir() {
            return Err(RecoveryError::DestinationIsDirectory(dest.to_path_buf()));
        }
        let src_meta = input
            .metadata()
            .await
            .map_err(RecoveryError::io("read metadata of", src))?;
        // creating dest would truncate src
        if meta.dev() == src_meta.dev() && meta.ino() == src_meta.ino() {
            return Err(RecoveryError::SameFile(dest.to_path_buf()));
        }
    }

    let mut output = tokio::fs::File::create(dest)
        .await
        .map_err(RecoveryError::io("create", dest))?;
    tokio::io::copy(&mut input, &mut output)
        .await
        .map_err(RecoveryError::io("copy to", dest))?;
    output
        .flush()
        .await
        .map_err(RecoveryError::io("flush", dest))?;
    output
        .sync_all()
        .await
        .map_err(RecoveryError::io("sync", dest))?;
    drop(output);
    drop(input);

    tokio::fs::set_permissions(dest, permissions)
        .await
        .map_err(RecoveryError::io("set permissions on", dest))?;
    tokio::fs::remove_file(src)
        .await
        .map_err(RecoveryError::io("remove", src))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DialogCall, FakeDesktop};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    const PERMISSION_DENIED: &str = "ERROR : report.txt: vfs cache: failed to upload try #1, will retry in 10s: googleapi: Error 403: insufficientParentPermissions";

    struct Fixture {
        mounts: TempDir,
        elsewhere: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let mounts = TempDir::new().unwrap();
            std::fs::create_dir_all(mounts.path().join("team")).unwrap();
            Self {
                mounts,
                elsewhere: TempDir::new().unwrap(),
            }
        }

        fn layout(&self) -> MountLayout {
            MountLayout::new(self.mounts.path(), self.mounts.path().join(".cache"))
        }

        fn handler(&self, desktop: Arc<FakeDesktop>) -> ErrorHandler {
            ErrorHandler::new(desktop, Arc::new(IgnoreRuleSet::default()), self.layout())
        }

        fn stranded_file(&self) -> PathBuf {
            let path = self.mounts.path().join("team/report.txt");
            std::fs::write(&path, "quarterly numbers").unwrap();
            path
        }
    }

    #[tokio::test]
    async fn test_relocate_file_moves_content_and_mode() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&src, "payload").unwrap();
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o600)).unwrap();

        relocate_file(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "payload");
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_relocate_file_overwrites_existing_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("dest.txt");
        std::fs::write(&src, "new").unwrap();
        std::fs::write(&dest, "old content that is longer").unwrap();

        relocate_file(&src, &dest).await.unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_relocate_file_refuses_directory_destination() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let dest = dir.path().join("folder");
        std::fs::write(&src, "keep me").unwrap();
        std::fs::create_dir(&dest).unwrap();

        let err = relocate_file(&src, &dest).await.unwrap_err();

        assert!(matches!(err, RecoveryError::DestinationIsDirectory(_)));
        assert!(err.to_string().contains("is a directory"));
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "keep me");
    }

    #[tokio::test]
    async fn test_relocate_file_refuses_same_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, "quarterly numbers").unwrap();

        let err = relocate_file(&src, &src).await.unwrap_err();

        assert!(matches!(err, RecoveryError::SameFile(_)));
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "quarterly numbers");
    }

    #[tokio::test]
    async fn test_relocate_file_refuses_same_file_through_link() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.txt");
        let link = dir.path().join("link.txt");
        std::fs::write(&src, "quarterly numbers").unwrap();
        std::os::unix::fs::symlink(&src, &link).unwrap();

        let err = relocate_file(&src, &link).await.unwrap_err();

        assert!(matches!(err, RecoveryError::SameFile(_)));
        assert_eq!(std::fs::read_to_string(&src).unwrap(), "quarterly numbers");
    }

    #[tokio::test]
    async fn test_relocate_file_missing_source() {
        let dir = TempDir::new().unwrap();
        let err = relocate_file(&dir.path().join("nope"), &dir.path().join("dest"))
            .await
            .unwrap_err();

        match err {
            RecoveryError::Io { action, source, .. } => {
                assert_eq!(action, "open");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dir.path().join("dest").exists());
    }

    #[tokio::test]
    async fn test_suppressed_entry_is_ignored() {
        let fixture = Fixture::new();
        let desktop = Arc::new(FakeDesktop::new());
        let entry = LogEntry::with_message("ERROR : dir: failed to make directory");

        let result = fixture.handler(desktop.clone()).handle_entry(&entry, "team").await;

        assert!(matches!(result, Remediation::Ignored));
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_error_is_ignored() {
        let fixture = Fixture::new();
        let desktop = Arc::new(FakeDesktop::new());
        let entry = LogEntry::with_message("INFO : vfs cache: cleaned");

        let result = fixture.handler(desktop.clone()).handle_entry(&entry, "team").await;

        assert!(matches!(result, Remediation::Ignored));
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test]
    async fn test_plain_error_is_notified() {
        let fixture = Fixture::new();
        let desktop = Arc::new(FakeDesktop::new());
        let entry = LogEntry::with_message("ERROR : something broke");

        let result = fixture.handler(desktop.clone()).handle_entry(&entry, "team").await;

        assert!(matches!(result, Remediation::Notified));
        assert_eq!(
            desktop.calls(),
            vec![DialogCall::Error {
                title: "Drive Error: team".to_string(),
                message: "The following error occurred:\n\nERROR : something broke".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_permission_denied_file_is_relocated() {
        let fixture = Fixture::new();
        let stranded = fixture.stranded_file();
        let target = fixture.elsewhere.path().join("report.txt");
        let desktop =
            Arc::new(FakeDesktop::new().answer_save_file(Ok(Some(target.clone()))));

        let result = fixture
            .handler(desktop.clone())
            .handle_entry(&LogEntry::with_message(PERMISSION_DENIED), "team")
            .await;

        match result {
            Remediation::Relocated { from, to } => {
                assert_eq!(from, stranded);
                assert_eq!(to, target);
            }
            other => panic!("unexpected remediation: {other:?}"),
        }
        assert!(!stranded.exists());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "quarterly numbers");

        let calls = desktop.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(&calls[0], DialogCall::Error { title, .. } if title == "Drive Error: team"));
        assert_eq!(
            calls[1],
            DialogCall::PickSaveFile {
                suggested_name: "report.txt".to_string()
            }
        );
        assert!(matches!(&calls[2], DialogCall::Info { title, .. } if title == "File Moved"));
    }

    #[tokio::test]
    async fn test_file_already_gone_is_abandoned() {
        let fixture = Fixture::new();
        let desktop = Arc::new(FakeDesktop::new());

        let result = fixture
            .handler(desktop.clone())
            .handle_entry(&LogEntry::with_message(PERMISSION_DENIED), "team")
            .await;

        assert!(matches!(result, Remediation::Abandoned(AbandonReason::FileGone)));
        assert!(desktop.calls().is_empty());
    }

    #[tokio::test]
    async fn test_picker_cancelled_leaves_file() {
        let fixture = Fixture::new();
        let stranded = fixture.stranded_file();
        let desktop = Arc::new(FakeDesktop::new().answer_save_file(Err(DialogError::Cancelled)));

        let result = fixture
            .handler(desktop.clone())
            .handle_entry(&LogEntry::with_message(PERMISSION_DENIED), "team")
            .await;

        assert!(matches!(
            result,
            Remediation::Abandoned(AbandonReason::PickerCancelled)
        ));
        assert!(stranded.exists());
        assert_eq!(desktop.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_picker_answer_is_abandoned() {
        let fixture = Fixture::new();
        fixture.stranded_file();
        let desktop = Arc::new(FakeDesktop::new().answer_save_file(Ok(None)));

        let result = fixture
            .handler(desktop)
            .handle_entry(&LogEntry::with_message(PERMISSION_DENIED), "team")
            .await;

        assert!(matches!(
            result,
            Remediation::Abandoned(AbandonReason::NoDestination)
        ));
    }

    #[tokio::test]
    async fn test_directory_destination_reports_failure() {
        let fixture = Fixture::new();
        let stranded = fixture.stranded_file();
        let desktop = Arc::new(
            FakeDesktop::new().answer_save_file(Ok(Some(fixture.elsewhere.path().to_path_buf()))),
        );

        let result = fixture
            .handler(desktop.clone())
            .handle_entry(&LogEntry::with_message(PERMISSION_DENIED), "team")
            .await;

        assert!(matches!(
            result,
            Remediation::RelocationFailed(RecoveryError::DestinationIsDirectory(_))
        ));
        assert!(stranded.exists());
        let calls = desktop.calls();
        assert!(matches!(
            calls.last(),
            Some(DialogCall::Error { title, message })
                if title == "Error Moving File" && message.contains("is a directory")
        ));
    }

    #[tokio::test]
    async fn test_picking_the_stranded_file_keeps_it() {
        let fixture = Fixture::new();
        let stranded = fixture.stranded_file();
        let desktop = Arc::new(FakeDesktop::new().answer_save_file(Ok(Some(stranded.clone()))));

        let result = fixture
            .handler(desktop.clone())
            .handle_entry(&LogEntry::with_message(PERMISSION_DENIED), "team")
            .await;

        assert!(matches!(
            result,
            Remediation::RelocationFailed(RecoveryError::SameFile(_))
        ));
        assert_eq!(std::fs::read_to_string(&stranded).unwrap(), "quarterly numbers");
        assert!(matches!(
            desktop.calls().last(),
            Some(DialogCall::Error { title, .. }) if title == "Error Moving File"
        ));
    }

    #[tokio::test]
    async fn test_file_name_escaping_drive_is_abandoned() {
        let fixture = Fixture::new();
        std::fs::write(fixture.mounts.path().join("secret.txt"), "outside").unwrap();
        let desktop = Arc::new(FakeDesktop::new());
        let entry = LogEntry::with_message(
            "ERROR : ../secret.txt: vfs cache: failed to upload try #1, will retry in 10s: googleapi: Error 403: insufficientParentPermissions",
        );

        let result = fixture.handler(desktop.clone()).handle_entry(&entry, "team").await;

        assert!(matches!(
            result,
            Remediation::Abandoned(AbandonReason::OutsideDrive(_))
        ));
        assert!(desktop.calls().is_empty());
        assert!(fixture.mounts.path().join("secret.txt").exists());
    }

    #[tokio::test]
    async fn test_unparseable_file_name_is_abandoned() {
        let fixture = Fixture::new();
        let desktop = Arc::new(FakeDesktop::new());
        let entry = LogEntry::with_message(
            "ERROR vfs cache: failed to upload: insufficientParentPermissions",
        );

        let result = fixture.handler(desktop.clone()).handle_entry(&entry, "team").await;

        assert!(matches!(result, Remediation::Abandoned(AbandonReason::NoFileName)));
        assert!(desktop.calls().is_empty());
    }
}

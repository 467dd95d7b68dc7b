//! Drive lifecycle use case
//!
//! Mounting a drive means starting its `rclone@<drive>.service` unit. The
//! target `all` stands for every configured rclone remote. Setting drives up
//! writes their remotes, prepares their directories and brings each unit
//! into the state the user selected.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{unit_name, Drive, MountLayout};
use crate::ports::{IRemoteConfig, IUnitManager, RemoteCredentials, UnitStatus};

/// Mount/unmount target that expands to every configured remote
pub const ALL_DRIVES: &str = "all";

/// Errors of the drive lifecycle operations
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("Failed to list rclone remotes: {source:#}")]
    ListRemotes { source: anyhow::Error },

    #[error("Failed to get service status: {source:#}")]
    Status { source: anyhow::Error },

    #[error("Failed to reload systemd: {source:#}")]
    Reload { source: anyhow::Error },

    #[error("failed to create remote {name}: {source:#}")]
    Remote { name: String, source: anyhow::Error },

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Some units could not be brought into the requested state
    #[error("Error while handling systemd services:\n{}", bullet_list(.failures))]
    Units { failures: Vec<String> },
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("- {item}\n")).collect()
}

/// One row of `rclonemgr ls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountStatus {
    pub name: String,
    pub status: String,
    pub mount_path: PathBuf,
}

impl MountStatus {
    pub fn glyph(&self) -> &'static str {
        status_glyph(&self.status)
    }
}

/// Marker shown in front of a unit's active state
pub fn status_glyph(active_state: &str) -> &'static str {
    match active_state {
        "active" => "\u{2705}",
        "failed" => "\u{274c}",
        "inactive" => "\u{2b1c}",
        _ => "\u{2753}",
    }
}

/// Result of starting or stopping one drive's unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitAction {
    pub drive: String,
    /// The error message if the unit did not change state
    pub error: Option<String>,
}

impl UnitAction {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Mounts, unmounts, lists and sets up drives
pub struct DriveManager {
    units: Arc<dyn IUnitManager>,
    remotes: Arc<dyn IRemoteConfig>,
    layout: MountLayout,
}

impl DriveManager {
    pub fn new(
        units: Arc<dyn IUnitManager>,
        remotes: Arc<dyn IRemoteConfig>,
        layout: MountLayout,
    ) -> Self {
        Self {
            units,
            remotes,
            layout,
        }
    }

    /// Replaces `all` by every configured remote; other names pass through
    pub async fn resolve_targets(&self, targets: &[String]) -> Result<Vec<String>, DriveError> {
        if targets.iter().any(|t| t == ALL_DRIVES) {
            return self.remote_names().await;
        }
        Ok(targets.to_vec())
    }

    /// Starts the unit of every target
    ///
    /// A failing unit does not stop the others; each outcome is reported.
    pub async fn mount(&self, targets: &[String]) -> Result<Vec<UnitAction>, DriveError> {
        let mut actions = Vec::new();
        for drive in self.resolve_targets(targets).await? {
            let result = self.units.start(&unit_name(&drive)).await;
            actions.push(record("mount", drive, result));
        }
        Ok(actions)
    }

    /// Stops the unit of every target
    pub async fn umount(&self, targets: &[String]) -> Result<Vec<UnitAction>, DriveError> {
        let mut actions = Vec::new();
        for drive in self.resolve_targets(targets).await? {
            let result = self.units.stop(&unit_name(&drive)).await;
            actions.push(record("umount", drive, result));
        }
        Ok(actions)
    }

    /// State and mount path of every configured remote's unit
    pub async fn list(&self) -> Result<Vec<MountStatus>, DriveError> {
        let units: Vec<String> = self
            .remote_names()
            .await?
            .iter()
            .map(|name| unit_name(name))
            .collect();
        let statuses = self
            .units
            .status(&units)
            .await
            .map_err(|source| DriveError::Status { source })?;

        Ok(statuses
            .into_iter()
            .map(|status| self.mount_status(status))
            .collect())
    }

    /// Applies the user's drive selection
    ///
    /// Enabled drives get a remote, their directories and a started unit
    /// (enabled at login when `auto_mount` is set). Disabled drives lose
    /// their remote, their unit is stopped and disabled and their cache is
    /// removed. Unit failures are collected and reported together.
    pub async fn apply(
        &self,
        drives: &[Drive],
        credentials: &RemoteCredentials,
    ) -> Result<(), DriveError> {
        for drive in drives {
            self.remotes
                .create_or_delete_remote(drive, credentials)
                .await
                .map_err(|source| DriveError::Remote {
                    name: drive.drive_name(),
                    source,
                })?;
        }

        self.units
            .reload()
            .await
            .map_err(|source| DriveError::Reload { source })?;

        let mut failures = Vec::new();
        for drive in drives {
            let name = drive.drive_name();
            create_dir(self.layout.drive_path(&name)).await?;
            create_dir(self.layout.cache_path(&name)).await?;

            if let Err(e) = self.apply_unit(drive, &name).await {
                warn!(drive = %name, error = %e, "Failed to apply drive");
                failures.push(format!("{e:#}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DriveError::Units { failures })
        }
    }

    async fn apply_unit(&self, drive: &Drive, name: &str) -> anyhow::Result<()> {
        let unit = unit_name(name);
        if drive.enabled {
            self.units.start(&unit).await?;
            if drive.auto_mount {
                self.units.enable(&unit).await?;
            }
            info!(drive = %name, auto_mount = drive.auto_mount, "Drive mounted");
        } else {
            self.units.stop(&unit).await?;
            self.units.disable(&unit).await?;
            self.remove_cache(name).await;
            info!(drive = %name, "Drive disabled");
        }
        Ok(())
    }

    async fn remove_cache(&self, name: &str) {
        let cache = self.layout.cache_path(name);
        match tokio::fs::remove_dir_all(&cache).await {
            Ok(()) => debug!(path = %cache.display(), "Removed drive cache"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %cache.display(), error = %e, "Failed to remove drive cache"),
        }
    }

    async fn remote_names(&self) -> Result<Vec<String>, DriveError> {
        self.remotes
            .remote_names()
            .await
            .map_err(|source| DriveError::ListRemotes { source })
    }

    fn mount_status(&self, status: UnitStatus) -> MountStatus {
        let name = status.drive_name().unwrap_or_else(|| status.name.clone());
        MountStatus {
            mount_path: self.layout.drive_path(&name),
            name,
            status: status.active_state,
        }
    }
}

fn record(op: &str, drive: String, result: anyhow::Result<()>) -> UnitAction {
    match result {
        Ok(()) => {
            info!(drive = %drive, "{op} succeeded");
            UnitAction { drive, error: None }
        }
        Err(e) => {
            warn!(drive = %drive, error = %e, "{op} failed");
            UnitAction {
                drive,
                error: Some(format!("{e:#}")),
            }
        }
    }
}

async fn create_dir(path: PathBuf) -> Result<(), DriveError> {
    tokio::fs::create_dir_all(&path)
        .await
        .map_err(|source| DriveError::CreateDir { path, source })
}

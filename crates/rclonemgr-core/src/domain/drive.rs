//! Logical drives, their systemd units and their place on disk
//!
//! A logical drive `X` is an rclone remote named `X`, mounted by the
//! templated user unit `rclone@X.service` at `<mount root>/X`, with its VFS
//! cache under `<cache root>/X`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

const UNIT_PREFIX: &str = "rclone@";
const UNIT_SUFFIX: &str = ".service";

/// Characters that are replaced by `_` when turning a display name into a drive name
const UNSAFE_CHARS: &[char] = &[' ', '/', '\\', ':', '?', '*', '"', '<', '>', '|', '\'', '&', '%'];

/// A drive as offered by the cloud provider, with the user's selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub name: String,
    pub id: String,
    pub enabled: bool,
    pub auto_mount: bool,
}

impl Drive {
    /// The sanitized name used for the remote, the unit and the mount directory
    pub fn drive_name(&self) -> String {
        sanitize_drive_name(&self.name)
    }
}

/// Turns a human-readable drive title into something safe for paths, remote names and unit instances
pub fn sanitize_drive_name(name: &str) -> String {
    name.trim().replace(UNSAFE_CHARS, "_")
}

/// `my_drive` -> `rclone@my_drive.service`
pub fn unit_name(drive_name: &str) -> String {
    format!("{UNIT_PREFIX}{drive_name}{UNIT_SUFFIX}")
}

/// `rclone@my_drive.service` -> `my_drive`
pub fn drive_name_from_unit(unit: &str) -> Result<String, DomainError> {
    unit.strip_prefix(UNIT_PREFIX)
        .and_then(|rest| rest.strip_suffix(UNIT_SUFFIX))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| DomainError::InvalidUnitName(unit.to_string()))
}

/// Where drives live on the local machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountLayout {
    root: PathBuf,
    cache_root: PathBuf,
}

impl MountLayout {
    pub fn new(root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache_root: cache_root.into(),
        }
    }

    /// Directory that holds one mount point per drive
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mount point of a single drive
    pub fn drive_path(&self, drive_name: &str) -> PathBuf {
        self.root.join(drive_name)
    }

    /// rclone VFS cache directory of a single drive
    pub fn cache_path(&self, drive_name: &str) -> PathBuf {
        self.cache_root.join(drive_name)
    }

    /// Local path of a file reported by rclone relative to the drive root
    pub fn file_path(&self, drive_name: &str, file_name: &str) -> PathBuf {
        self.drive_path(drive_name).join(file_name)
    }
}

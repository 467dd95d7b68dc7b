//! Apply command - Set up drives from a selection file
//!
//! `rclonemgr apply <file>` reads a YAML (or JSON) document listing the
//! drives the user picked together with the OAuth client and token to use,
//! then creates or deletes the rclone remotes and brings every
//! `rclone@<drive>.service` unit into the selected state.
//!
//! ```yaml
//! credentials:
//!   client_id: 1234.apps.googleusercontent.com
//!   client_secret: secret
//!   token: '{"access_token":"...","refresh_token":"..."}'
//! drives:
//!   - { name: My Drive, id: my_drive, enabled: true, auto_mount: true }
//!   - { name: Archive, id: 0ABCdef, enabled: false, auto_mount: false }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use rclonemgr_core::domain::Drive;
use rclonemgr_core::ports::RemoteCredentials;
use serde::Deserialize;
use tracing::info;

use crate::commands::CommandContext;

/// Drives to set up and the credentials their remotes use
#[derive(Debug, Deserialize)]
pub struct DriveSelection {
    pub credentials: RemoteCredentials,
    pub drives: Vec<Drive>,
}

impl DriveSelection {
    /// Reads a selection file; JSON is accepted since it is valid YAML
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse drive selection {}", path.display()))
    }
}

/// Create remotes and units for a drive selection
#[derive(Debug, Args)]
pub struct ApplyCommand {
    /// Drive selection file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

impl ApplyCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let selection = DriveSelection::load(&self.file)?;
        info!(drives = selection.drives.len(), "Applying drive selection");

        ctx.drive_manager()
            .apply(&selection.drives, &selection.credentials)
            .await?;

        for drive in &selection.drives {
            let state = if drive.enabled { "enabled" } else { "disabled" };
            formatter.success(&format!("{}: {state}", drive.drive_name()));
        }
        formatter.print_value(&serde_json::json!({
            "success": true,
            "drives": selection.drives,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_selection_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drives.yaml");
        std::fs::write(
            &path,
            r#"
credentials:
  client_id: id
  client_secret: secret
  token: '{"access_token":"abc"}'
drives:
  - { name: My Drive, id: my_drive, enabled: true, auto_mount: true }
  - { name: Archive, id: 0ABC, enabled: false, auto_mount: false }
"#,
        )
        .unwrap();

        let selection = DriveSelection::load(&path).unwrap();

        assert_eq!(selection.credentials.token, r#"{"access_token":"abc"}"#);
        assert_eq!(selection.drives.len(), 2);
        assert_eq!(selection.drives[0].drive_name(), "My_Drive");
        assert!(!selection.drives[1].enabled);
    }

    #[test]
    fn test_load_selection_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drives.json");
        std::fs::write(
            &path,
            r#"{"credentials":{"client_id":"id","client_secret":"s","token":"t"},"drives":[]}"#,
        )
        .unwrap();

        let selection = DriveSelection::load(&path).unwrap();
        assert!(selection.drives.is_empty());
    }

    #[test]
    fn test_load_selection_missing_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drives.yaml");
        std::fs::write(&path, "drives: []\n").unwrap();

        let err = DriveSelection::load(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse drive selection"));
    }
}

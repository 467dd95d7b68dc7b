//! rclone remote configuration
//!
//! Implements [`IRemoteConfig`] with `rclone listremotes` and
//! `rclone config create|delete`. Each enabled drive becomes one remote of
//! type `drive`; shared drives carry their id as `team_drive`.

use anyhow::{bail, Context, Result};
use rclonemgr_core::config::RcloneConfig;
use rclonemgr_core::domain::Drive;
use rclonemgr_core::ports::{IRemoteConfig, RemoteCredentials};
use tokio::process::Command;
use tracing::{debug, info};

/// Drive id of the user's own drive, which has no `team_drive`
pub const MY_DRIVE_ID: &str = "my_drive";

/// Reads and writes rclone's remote configuration through the rclone CLI
#[derive(Debug, Clone)]
pub struct RcloneRemoteConfig {
    binary: String,
}

impl Default for RcloneRemoteConfig {
    fn default() -> Self {
        Self::from_config(&RcloneConfig::default())
    }
}

impl RcloneRemoteConfig {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn from_config(config: &RcloneConfig) -> Self {
        Self::new(config.binary.clone())
    }

    async fn rclone(&self, args: &[String]) -> Result<String> {
        debug!(?args, "Running rclone");
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to execute {}. Is rclone installed?", self.binary))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("rclone {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl IRemoteConfig for RcloneRemoteConfig {
    async fn remote_names(&self) -> Result<Vec<String>> {
        let stdout = self.rclone(&["listremotes".to_string()]).await?;
        Ok(parse_listremotes(&stdout))
    }

    #[tracing::instrument(skip(self, credentials), fields(drive = %drive.drive_name()))]
    async fn create_or_delete_remote(
        &self,
        drive: &Drive,
        credentials: &RemoteCredentials,
    ) -> Result<()> {
        let name = drive.drive_name();
        if drive.enabled {
            self.rclone(&create_remote_args(drive, credentials))
                .await
                .with_context(|| format!("failed to create remote {name}"))?;
            info!(remote = %name, "Added remote");
        } else {
            info!(remote = %name, "Removing remote");
            // deleting a remote that does not exist is not an error
            if let Err(e) = self.rclone(&delete_remote_args(drive)).await {
                debug!(error = %e, remote = %name, "Remote was not removed");
            }
        }
        Ok(())
    }
}

/// `rclone listremotes` prints one `name:` per line
pub fn parse_listremotes(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_suffix(':'))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Arguments of `rclone config create` for one drive
pub fn create_remote_args(drive: &Drive, credentials: &RemoteCredentials) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "config".into(),
        "create".into(),
        drive.drive_name(),
        "drive".into(),
        "scope".into(),
        "drive".into(),
        "root_folder_id".into(),
        String::new(),
    ];
    if drive.id != MY_DRIVE_ID {
        args.push("team_drive".into());
        args.push(drive.id.clone());
    }
    args.extend([
        "client_id".into(),
        credentials.client_id.clone(),
        "client_secret".into(),
        credentials.client_secret.clone(),
        "token".into(),
        credentials.token.clone(),
        "--non-interactive".into(),
    ]);
    args
}

fn delete_remote_args(drive: &Drive) -> Vec<String> {
    vec!["config".into(), "delete".into(), drive.drive_name()]
}

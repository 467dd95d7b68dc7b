//! Subcommands of `rclonemgr`
//!
//! Every command receives a [`CommandContext`] with the loaded
//! configuration and the selected output format.

pub mod apply;
pub mod completions;
pub mod config;
pub mod journal;
pub mod ls;
pub mod mount;
pub mod request_copy;
pub mod transfer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use rclonemgr_core::config::Config;
use rclonemgr_core::usecases::DriveManager;
use rclonemgr_process::{RcloneRemoteConfig, SystemctlUnitManager};
use tracing::debug;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// State shared by all subcommands
#[derive(Debug)]
pub struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl CommandContext {
    /// Loads the configuration named with `--config`, or the default one
    ///
    /// An explicit path must exist and parse; the default path falls back
    /// to built-in defaults.
    pub fn load(config_path: Option<PathBuf>, format: OutputFormat) -> Result<Self> {
        let (config, config_path) = match config_path {
            Some(path) => {
                let config = Config::load(&path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?;
                (config, path)
            }
            None => {
                let path = Config::default_path();
                (Config::load_or_default(&path), path)
            }
        };
        debug!(config_path = %config_path.display(), "Loaded configuration");

        Ok(Self {
            config,
            config_path,
            format,
        })
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    /// Drive lifecycle backed by `systemctl --user` and the rclone CLI
    pub fn drive_manager(&self) -> DriveManager {
        DriveManager::new(
            Arc::new(SystemctlUnitManager::default()),
            Arc::new(RcloneRemoteConfig::from_config(&self.config.rclone)),
            self.config.layout(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "rclone:\n  binary: /opt/rclone\n").unwrap();

        let ctx = CommandContext::load(Some(path.clone()), OutputFormat::Human).unwrap();

        assert_eq!(ctx.config.rclone.binary, "/opt/rclone");
        assert_eq!(ctx.config_path, path);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = TempDir::new().unwrap();
        let err = CommandContext::load(Some(dir.path().join("nope.yaml")), OutputFormat::Json)
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to load configuration from"));
    }
}

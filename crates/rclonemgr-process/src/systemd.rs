//! systemd user unit management
//!
//! Implements [`IUnitManager`] on top of `systemctl --user`. `start` and
//! `stop` block until systemd finished the job, so a non-zero exit means the
//! unit did not reach the requested state.

use anyhow::{bail, Context, Result};
use rclonemgr_core::ports::{IUnitManager, UnitStatus};
use tokio::process::Command;
use tracing::{debug, info};

const SYSTEMCTL: &str = "systemctl";

/// Manages `rclone@<drive>.service` units through `systemctl --user`
#[derive(Debug, Clone)]
pub struct SystemctlUnitManager {
    binary: String,
}

impl Default for SystemctlUnitManager {
    fn default() -> Self {
        Self::new(SYSTEMCTL)
    }
}

impl SystemctlUnitManager {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Runs `systemctl --user <args>` and returns stdout
    async fn systemctl(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "Running systemctl");
        let output = Command::new(&self.binary)
            .arg("--user")
            .args(args)
            .output()
            .await
            .context("Failed to execute systemctl. Is systemd available?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("systemctl {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl IUnitManager for SystemctlUnitManager {
    #[tracing::instrument(skip(self))]
    async fn start(&self, unit: &str) -> Result<()> {
        self.systemctl(&["start", unit])
            .await
            .with_context(|| format!("Failed to start service {unit:?}"))?;
        info!(unit, "Unit started");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn stop(&self, unit: &str) -> Result<()> {
        self.systemctl(&["stop", unit])
            .await
            .with_context(|| format!("Failed to stop service {unit:?}"))?;
        info!(unit, "Unit stopped");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn status(&self, units: &[String]) -> Result<Vec<UnitStatus>> {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["show", "--property=Id,ActiveState", "--"];
        args.extend(units.iter().map(String::as_str));
        let stdout = self.systemctl(&args).await?;
        Ok(parse_show_output(&stdout))
    }

    #[tracing::instrument(skip(self))]
    async fn enable(&self, unit: &str) -> Result<()> {
        self.systemctl(&["enable", unit])
            .await
            .with_context(|| format!("Failed to enable service {unit:?}"))?;
        info!(unit, "Unit enabled");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn disable(&self, unit: &str) -> Result<()> {
        self.systemctl(&["disable", unit])
            .await
            .with_context(|| format!("Failed to disable service {unit:?}"))?;
        info!(unit, "Unit disabled");
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.systemctl(&["daemon-reload"])
            .await
            .context("Failed to reload systemd")?;
        Ok(())
    }
}

/// Parses `systemctl show --property=Id,ActiveState` output
///
/// Each unit is a block of `Key=Value` lines; blocks are separated by an
/// empty line and appear in the order the units were requested.
pub fn parse_show_output(output: &str) -> Vec<UnitStatus> {
    let mut statuses = Vec::new();
    let mut name = None;
    let mut active_state = None;

    let mut flush = |name: &mut Option<String>, state: &mut Option<String>| {
        if let Some(name) = name.take() {
            statuses.push(UnitStatus {
                name,
                active_state: state.take().unwrap_or_default(),
            });
        }
        *state = None;
    };

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(&mut name, &mut active_state);
            continue;
        }
        match line.split_once('=') {
            Some(("Id", value)) => name = Some(value.to_string()),
            Some(("ActiveState", value)) => active_state = Some(value.to_string()),
            _ => {}
        }
    }
    flush(&mut name, &mut active_state);

    statuses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_show_output() {
        let output = "\
Id=rclone@my_drive.service
ActiveState=active

ActiveState=failed
Id=rclone@team.service

Id=rclone@old.service
ActiveState=inactive
";
        let statuses = parse_show_output(output);
        assert_eq!(
            statuses,
            vec![
                UnitStatus {
                    name: "rclone@my_drive.service".to_string(),
                    active_state: "active".to_string(),
                },
                UnitStatus {
                    name: "rclone@team.service".to_string(),
                    active_state: "failed".to_string(),
                },
                UnitStatus {
                    name: "rclone@old.service".to_string(),
                    active_state: "inactive".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_show_output_empty() {
        assert!(parse_show_output("").is_empty());
        assert!(parse_show_output("\n\n").is_empty());
    }

    #[tokio::test]
    async fn test_status_of_nothing_does_not_call_systemctl() {
        let manager = SystemctlUnitManager::new("/nonexistent/systemctl");
        assert!(manager.status(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_command_is_an_error() {
        let manager = SystemctlUnitManager::new("false");
        let err = manager.start("rclone@x.service").await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to start service"));
    }
}

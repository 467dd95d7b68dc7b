//! Ls command - List drives and the state of their units
//!
//! Renders a table of every configured remote by default; `--json` and
//! `--yaml` print a list of `{name, status, mount_path}` records instead.

use anyhow::{Context, Result};
use clap::Args;
use rclonemgr_core::usecases::MountStatus;

use crate::commands::CommandContext;
use crate::output::{get_formatter, render_table, OutputFormat};

/// List all available mounts and their status
#[derive(Debug, Args)]
pub struct LsCommand {
    /// Output in YAML format
    #[arg(short = 'y', long)]
    pub yaml: bool,
}

impl LsCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let format = if self.yaml {
            OutputFormat::Yaml
        } else {
            ctx.format
        };
        let statuses = ctx.drive_manager().list().await?;

        if format.is_structured() {
            let value = serde_json::to_value(&statuses).context("Failed to serialize mounts")?;
            get_formatter(format).print_value(&value);
        } else {
            println!();
            print!("{}", status_table(&statuses));
            println!();
        }
        Ok(())
    }
}

fn status_table(statuses: &[MountStatus]) -> String {
    let rows: Vec<Vec<String>> = statuses
        .iter()
        .map(|status| {
            vec![
                status.glyph().to_string(),
                status.name.clone(),
                status.status.clone(),
                status.mount_path.display().to_string(),
            ]
        })
        .collect();
    render_table(&["Ok?", "Name", "Status", "Mount Path"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn status(name: &str, state: &str) -> MountStatus {
        MountStatus {
            name: name.to_string(),
            status: state.to_string(),
            mount_path: PathBuf::from(format!("/home/me/google/{name}")),
        }
    }

    #[test]
    fn test_status_table_rows() {
        let table = status_table(&[status("my_drive", "active"), status("team", "failed")]);

        assert!(table.contains("Mount Path"));
        let my_drive = table.lines().find(|l| l.contains("my_drive")).unwrap();
        assert!(my_drive.contains("\u{2705}"));
        assert!(my_drive.contains("/home/me/google/my_drive"));
        let team = table.lines().find(|l| l.contains("team")).unwrap();
        assert!(team.contains("\u{274c}"));
        assert!(team.contains("failed"));
    }

    #[test]
    fn test_structured_records() {
        let value = serde_json::to_value([status("team", "inactive")]).unwrap();
        assert_eq!(
            value,
            serde_json::json!([{
                "name": "team",
                "status": "inactive",
                "mount_path": "/home/me/google/team",
            }])
        );

        let yaml = serde_yaml::to_string(&value).unwrap();
        assert!(yaml.contains("name: team"));
        assert!(yaml.contains("mount_path: /home/me/google/team"));
    }
}

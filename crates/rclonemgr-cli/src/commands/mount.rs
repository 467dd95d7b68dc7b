//! Mount commands - Start and stop drive units
//!
//! Provides `rclonemgr mount` and `rclonemgr umount`. Each drive is mounted
//! by its `rclone@<drive>.service` user unit; the target `all` stands for
//! every configured rclone remote. A failing drive does not stop the
//! others, but makes the command exit with an error.

use anyhow::Result;
use clap::Args;
use rclonemgr_core::usecases::UnitAction;
use tracing::info;

use crate::commands::CommandContext;
use crate::output::OutputFormatter;

/// Mount one or more drives
#[derive(Debug, Args)]
pub struct MountCommand {
    /// Drives to mount, or `all`
    #[arg(required = true, value_name = "DRIVE")]
    pub drives: Vec<String>,
}

impl MountCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        info!(drives = ?self.drives, "Mounting drives");
        let actions = ctx.drive_manager().mount(&self.drives).await?;
        report(ctx, "mount", "Mounted Drive", &actions)
    }
}

/// Unmount one or more drives
#[derive(Debug, Args)]
pub struct UmountCommand {
    /// Drives to unmount, or `all`
    #[arg(required = true, value_name = "DRIVE")]
    pub drives: Vec<String>,
}

impl UmountCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        info!(drives = ?self.drives, "Unmounting drives");
        let actions = ctx.drive_manager().umount(&self.drives).await?;
        report(ctx, "umount", "Umounted Drive", &actions)
    }
}

/// Prints one line per drive and fails if any drive failed
fn report(ctx: &CommandContext, action: &str, done: &str, actions: &[UnitAction]) -> Result<()> {
    let formatter = ctx.formatter();
    print_actions(formatter.as_ref(), action, done, actions);

    let failed = actions.iter().filter(|a| !a.succeeded()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} drives failed to {action}", actions.len());
    }
    Ok(())
}

fn print_actions(formatter: &dyn OutputFormatter, action: &str, done: &str, actions: &[UnitAction]) {
    for outcome in actions {
        match &outcome.error {
            None => formatter.success(&format!("{done}: {}", outcome.drive)),
            Some(e) => formatter.error(&format!("Failed to {action} drive {}: {e}", outcome.drive)),
        }
    }

    formatter.print_value(&actions_json(action, actions));
}

fn actions_json(action: &str, actions: &[UnitAction]) -> serde_json::Value {
    let drives: Vec<serde_json::Value> = actions
        .iter()
        .map(|a| {
            serde_json::json!({
                "drive": a.drive,
                "success": a.succeeded(),
                "error": a.error,
            })
        })
        .collect();
    serde_json::json!({
        "action": action,
        "drives": drives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actions_json_shape() {
        let actions = vec![
            UnitAction {
                drive: "team".to_string(),
                error: None,
            },
            UnitAction {
                drive: "old".to_string(),
                error: Some("unit not found".to_string()),
            },
        ];

        let json = actions_json("mount", &actions);

        assert_eq!(json["action"], "mount");
        assert_eq!(json["drives"][0]["drive"], "team");
        assert_eq!(json["drives"][0]["success"], true);
        assert!(json["drives"][0]["error"].is_null());
        assert_eq!(json["drives"][1]["success"], false);
        assert_eq!(json["drives"][1]["error"], "unit not found");
    }
}

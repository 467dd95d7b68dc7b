//! Request-copy command - Hand a copy to a running daemon
//!
//! `rclonemgr request-copy <drive> <src...>` sends the sources to the
//! daemon of `<drive>` over its control socket. The daemon asks for the
//! destination and runs the copy; this command returns once the request
//! was accepted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use rclonemgr_core::domain::paths::absolutize;
use rclonemgr_core::domain::sanitize_drive_name;
use rclonemgr_ipc::send_copy_request;
use tracing::info;

use crate::commands::CommandContext;

/// Ask the daemon of a drive to copy files
#[derive(Debug, Args)]
pub struct RequestCopyCommand {
    /// Drive whose daemon handles the request
    pub drive: String,

    /// Files or directories to copy
    #[arg(required = true, value_name = "PATH")]
    pub sources: Vec<PathBuf>,
}

impl RequestCopyCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let socket = ctx.config.socket_path(&sanitize_drive_name(&self.drive));

        // the daemon resolves paths against its own working directory
        let sources = self
            .sources
            .iter()
            .map(|source| {
                absolutize(source).with_context(|| format!("Failed to resolve {}", source.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(socket = %socket.display(), sources = sources.len(), "Sending copy request");
        let reply = send_copy_request(&socket, &sources).await?;

        formatter.success(&format!("Copy request accepted by daemon ({reply})"));
        formatter.print_value(&serde_json::json!({
            "drive": self.drive,
            "sources": sources,
            "reply": reply,
        }));
        Ok(())
    }
}

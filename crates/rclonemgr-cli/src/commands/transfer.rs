//! Copy and move commands - Server-side transfers between drives
//!
//! `rclonemgr copy <src...> <dest>` and `rclonemgr move <src...> <dest>` run
//! the transfer in the foreground with the same progress dialog the file
//! manager integration uses. Every path must lie inside the mount root.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use rclonemgr_core::domain::TransferOp;
use rclonemgr_core::usecases::{TransferOrchestrator, TransferOutcome};
use rclonemgr_process::{TokioProcessRunner, ZenityDesktop};

use crate::commands::CommandContext;

/// Sources followed by the destination directory
#[derive(Debug, Args)]
pub struct TransferPaths {
    /// Files or directories to transfer, then the destination directory
    #[arg(required = true, num_args = 2.., value_name = "PATH")]
    pub paths: Vec<PathBuf>,
}

impl TransferPaths {
    /// Splits the arguments into sources and destination
    pub fn split(&self) -> (&[PathBuf], PathBuf) {
        match self.paths.split_last() {
            Some((destination, sources)) => (sources, destination.clone()),
            None => (&[], PathBuf::new()),
        }
    }
}

/// Copy files between drives
#[derive(Debug, Args)]
pub struct CopyCommand {
    #[command(flatten)]
    pub paths: TransferPaths,
}

impl CopyCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        run_transfer(ctx, TransferOp::Copy, &self.paths).await
    }
}

/// Move files between drives
#[derive(Debug, Args)]
pub struct MoveCommand {
    #[command(flatten)]
    pub paths: TransferPaths,
}

impl MoveCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        run_transfer(ctx, TransferOp::Move, &self.paths).await
    }
}

async fn run_transfer(ctx: &CommandContext, op: TransferOp, paths: &TransferPaths) -> Result<()> {
    let (sources, destination) = paths.split();
    let orchestrator = TransferOrchestrator::from_config(
        Arc::new(TokioProcessRunner::new()),
        Arc::new(ZenityDesktop::from_config(&ctx.config.dialogs)),
        &ctx.config,
    );

    let outcome = orchestrator.run(op, sources.to_vec(), destination).await;
    report(ctx, op, outcome)
}

fn report(ctx: &CommandContext, op: TransferOp, outcome: TransferOutcome) -> Result<()> {
    let formatter = ctx.formatter();
    match outcome {
        TransferOutcome::Completed {
            files_done,
            files_total,
        } => {
            formatter.success(op.success_message());
            formatter.info(&format!("{files_done} of {files_total} files transferred"));
            formatter.print_value(&serde_json::json!({
                "operation": op.as_str(),
                "status": "completed",
                "files_done": files_done,
                "files_total": files_total,
            }));
            Ok(())
        }
        TransferOutcome::Cancelled { sources_done } => {
            formatter.warn(&format!("{} cancelled", op.title()));
            formatter.print_value(&serde_json::json!({
                "operation": op.as_str(),
                "status": "cancelled",
                "sources_done": sources_done,
            }));
            Ok(())
        }
        TransferOutcome::Failed(e) => Err(e.into()),
    }
}

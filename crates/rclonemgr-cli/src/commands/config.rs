//! Config command - View and validate rclone-mgr configuration
//!
//! Provides the `rclonemgr config` CLI command which:
//! 1. Shows the effective configuration (YAML, or JSON with `--json`)
//! 2. Validates the configuration file and reports errors

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use rclonemgr_core::config::{Config, ValidationError};
use tracing::info;

use crate::commands::CommandContext;
use crate::output::{OutputFormat, OutputFormatter};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(ctx),
            ConfigCommand::Validate => execute_validate(ctx),
        }
    }
}

fn execute_show(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    info!(config_path = %ctx.config_path.display(), "Showing configuration");

    if matches!(ctx.format, OutputFormat::Json) {
        let json = serde_json::to_value(&ctx.config)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_value(&json);
    } else {
        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        formatter.info("");

        let yaml = serde_yaml::to_string(&ctx.config)
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

/// Result of checking one configuration file
#[derive(Debug, PartialEq)]
enum Validation {
    Missing,
    Unparsable(String),
    Checked(Vec<ValidationError>),
}

impl Validation {
    fn is_valid(&self) -> bool {
        matches!(self, Validation::Checked(errors) if errors.is_empty())
    }
}

fn validate_file(path: &Path) -> Validation {
    if !path.exists() {
        return Validation::Missing;
    }
    match Config::load(path) {
        Ok(config) => Validation::Checked(config.validate()),
        Err(e) => Validation::Unparsable(format!("{e:#}")),
    }
}

fn execute_validate(ctx: &CommandContext) -> Result<()> {
    let formatter = ctx.formatter();
    let path = &ctx.config_path;
    info!(config_path = %path.display(), "Validating configuration");

    let validation = validate_file(path);
    print_validation(formatter.as_ref(), path, &validation);

    if validation != Validation::Missing && !validation.is_valid() {
        anyhow::bail!("Configuration at {} is invalid", path.display());
    }
    Ok(())
}

fn print_validation(formatter: &dyn OutputFormatter, path: &Path, validation: &Validation) {
    let errors: Vec<String> = match validation {
        Validation::Missing => vec!["Configuration file not found. Using defaults.".to_string()],
        Validation::Unparsable(e) => vec![format!("Failed to parse configuration: {e}")],
        Validation::Checked(errors) => errors.iter().map(ToString::to_string).collect(),
    };
    formatter.print_value(&serde_json::json!({
        "valid": validation.is_valid(),
        "config_path": path.display().to_string(),
        "errors": errors,
    }));

    match validation {
        Validation::Missing => {
            formatter.info(&format!("Configuration file not found at {}", path.display()));
            formatter.info("Using default configuration.");
        }
        Validation::Unparsable(e) => {
            formatter.error(&format!("Failed to parse configuration: {e}"));
            formatter.info(&format!("File: {}", path.display()));
        }
        Validation::Checked(errors) if errors.is_empty() => {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
        }
        Validation::Checked(errors) => {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", path.display()));
            formatter.info("");
            for error in errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }
    }
}

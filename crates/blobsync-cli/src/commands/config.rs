//! Config command - View and validate blobsync configuration
//!
//! Provides the `blobsync config` CLI command which:
//! 1. Shows the configuration file, or the effective per-run settings
//!    after the managed overlay is applied
//! 2. Validates the configuration file and reports errors
//! 3. Prints the configuration file location
//!
//! SAS signatures are never printed.

use std::path::Path;

use anyhow::{Context, Result};
use blobsync_core::config::Config;
use clap::Subcommand;
use tracing::info;

use crate::output::{count_label, get_formatter, OutputFormat};

/// Placeholder printed instead of a SAS signature
const REDACTED: &str = "REDACTED";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show {
        /// Show the settings a run would use (managed overlay applied)
        #[arg(long)]
        effective: bool,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show { effective } => execute_show(*effective, format, config_path),
            ConfigCommand::Validate => execute_validate(format, config_path),
            ConfigCommand::Path => {
                let formatter = get_formatter(format);
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(effective: bool, format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);

    let mut config = match Config::load_if_exists(config_path) {
        Ok(config) => config,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), effective, "Showing configuration");

    let value = if effective {
        let mut snapshot = match config.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                formatter.error(&format!("Failed to apply managed settings: {e:#}"));
                return Ok(());
            }
        };
        snapshot.sas_credential = snapshot.sas_credential.as_deref().map(redact_signature);
        serde_yaml::to_value(&snapshot).context("Failed to serialize effective settings")?
    } else {
        config.storage.sas_url = config.storage.sas_url.as_deref().map(redact_signature);
        serde_yaml::to_value(&config).context("Failed to serialize configuration")?
    };

    if format.is_json() {
        let json = serde_json::to_value(&value).context("Failed to convert configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        let title = if effective {
            "Effective settings"
        } else {
            "Configuration"
        };
        formatter.success(&format!("{} ({})", title, config_path.display()));
        formatter.info("");

        let yaml = serde_yaml::to_string(&value).context("Failed to render YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_validate(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);

    if !config_path.exists() {
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "valid": false,
                "config_path": config_path.display().to_string(),
                "errors": ["Configuration file not found. Using defaults."],
            }));
        } else {
            formatter.warn(&format!(
                "Configuration file not found at {}",
                config_path.display()
            ));
            formatter.info("Using defaults; uploads are refused until storage is configured.");
        }
        return Ok(());
    }

    // Explicit load: a parse failure is the most useful thing to report
    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("{e:#}")],
                }));
            } else {
                formatter.error(&format!("{e:#}"));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");

    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!("Configuration has {}:", count_label(errors.len(), "error")));
        formatter.info(&format!("File: {}", config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    Ok(())
}

/// Replaces the `sig` query parameter of a SAS URL
fn redact_signature(sas_url: &str) -> String {
    let Some((base, query)) = sas_url.split_once('?') else {
        return sas_url.to_string();
    };
    let query = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some(("sig", _)) => format!("sig={REDACTED}"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

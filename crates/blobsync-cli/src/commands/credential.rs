//! Credential command - Report the SAS URL's validity window

use std::path::Path;

use anyhow::{Context, Result};
use blobsync_core::config::Config;
use blobsync_core::domain::credential::CredentialValidity;
use chrono::Utc;
use clap::Args;
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CredentialCommand {}

impl CredentialCommand {
    /// Execute the credential command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);

        let validity = match current_validity(config_path) {
            Ok(validity) => validity,
            Err(e) => {
                formatter.error(&format!("{e:#}"));
                return Ok(());
            }
        };

        info!(is_valid = validity.is_valid, "Checked SAS credential");

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&validity)?);
        } else if validity.is_valid {
            formatter.success(&validity.message);
        } else {
            formatter.warn(&validity.message);
        }

        Ok(())
    }
}

/// Validity of the SAS URL the next run would use
///
/// Applies the managed overlay, so a centrally pushed credential is the one
/// reported.
pub(crate) fn current_validity(config_path: &Path) -> Result<CredentialValidity> {
    let snapshot = Config::load_if_exists(config_path)
        .and_then(|config| config.snapshot())
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    Ok(CredentialValidity::for_credential(
        Utc::now(),
        snapshot.sas_credential(),
    ))
}

//! Status command - Display the last sync status
//!
//! Provides the `blobsync status` CLI command which:
//! 1. Reads the status file written by the daemon (or by `blobsync sync`)
//! 2. Shows the last status message and the last success time
//! 3. Shows the SAS credential's validity
//! 4. With `--follow`, keeps printing as the status file changes

use std::path::Path;

use anyhow::{Context, Result};
use blobsync_core::domain::credential::CredentialValidity;
use blobsync_core::ports::status::StatusSnapshot;
use blobsync_sync::status::FileStatusReporter;
use clap::Args;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::credential::current_validity;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Keep running and print each status change
    #[arg(short, long)]
    pub follow: bool,
}

impl StatusCommand {
    /// Execute the status command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);
        let status_path = FileStatusReporter::default_path();

        info!(status_path = %status_path.display(), "Reading sync status");

        let snapshot = match FileStatusReporter::read_snapshot(&status_path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                formatter.error(&format!("{e:#}"));
                return Ok(());
            }
        };

        let credential = match current_validity(config_path) {
            Ok(validity) => Some(validity),
            Err(e) => {
                formatter.warn(&format!("{e:#}"));
                None
            }
        };

        if format.is_json() {
            formatter.print_json(&status_json(&snapshot, credential.as_ref(), &status_path));
        } else {
            print_snapshot(formatter.as_ref(), &snapshot);
            if let Some(validity) = &credential {
                formatter.field("Credential", &validity.message);
            }
        }

        if self.follow {
            follow(formatter.as_ref(), &status_path, snapshot).await?;
        }

        Ok(())
    }
}

fn print_snapshot(formatter: &dyn OutputFormatter, snapshot: &StatusSnapshot) {
    formatter.field("Status", &snapshot.last_sync_status);
    formatter.field("Last success", &snapshot.last_success);
}

fn status_json(
    snapshot: &StatusSnapshot,
    credential: Option<&CredentialValidity>,
    status_path: &Path,
) -> serde_json::Value {
    serde_json::json!({
        "last_sync_status": snapshot.last_sync_status,
        "last_success": snapshot.last_success,
        "credential": credential,
        "status_file": status_path.display().to_string(),
    })
}

// ============================================================================
// --follow
// ============================================================================

/// Prints every new snapshot until Ctrl+C
///
/// Watches the status file's directory rather than the file itself, since
/// the reporter replaces the file by renaming a temporary one over it.
async fn follow(
    formatter: &dyn OutputFormatter,
    status_path: &Path,
    mut last: StatusSnapshot,
) -> Result<()> {
    let watch_dir = status_path
        .parent()
        .context("Status file has no parent directory")?;
    tokio::fs::create_dir_all(watch_dir)
        .await
        .with_context(|| format!("Failed to create {}", watch_dir.display()))?;

    let file_name = status_path.file_name().map(|n| n.to_os_string());
    let (tx, mut rx) = mpsc::channel::<()>(16);

    let mut watcher = RecommendedWatcher::new(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                let touches_status = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touches_status {
                    // A full channel already holds a wake-up
                    let _ = tx.try_send(());
                }
            }
            Err(e) => warn!(error = %e, "Status watcher error"),
        },
        notify::Config::default(),
    )
    .context("Failed to create status watcher")?;
    watcher
        .watch(watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("Failed to watch {}", watch_dir.display()))?;

    formatter.info("");
    formatter.info("Watching for changes (Ctrl+C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            woke = rx.recv() => {
                if woke.is_none() {
                    break;
                }
                let snapshot = match FileStatusReporter::read_snapshot(status_path) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        debug!(error = %format!("{e:#}"), "Status file not readable yet");
                        continue;
                    }
                };
                if snapshot != last {
                    // Each formatter ignores the calls meant for the other
                    formatter.info("");
                    print_snapshot(formatter, &snapshot);
                    formatter.print_json(&serde_json::to_value(&snapshot)?);
                    last = snapshot;
                }
            }
        }
    }

    Ok(())
}

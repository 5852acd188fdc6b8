//! Sync command - Upload the configured directories now
//!
//! Provides the `blobsync sync` CLI command which:
//! 1. Hands the request to a running `blobsyncd` (SIGUSR1), if there is one
//! 2. Otherwise reads the configuration snapshot (YAML plus managed overlay)
//! 3. Creates the adapters (sysfs network state, Azure object store, status file)
//! 4. Runs the SyncOrchestrator once, in-process
//! 5. Displays per-directory results
//!
//! Both paths share the status file with the daemon, so `blobsync status`
//! shows the outcome afterwards. `--local` forces an in-process run.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use blobsync_azure::provider::AzureObjectStoreFactory;
use blobsync_core::config::FileConfigSource;
use blobsync_core::domain::sync_result::{DirectoryReport, FileOutcome, SyncResult};
use blobsync_core::ports::status::{IStatusObserver, IStatusReporter, StatusSnapshot};
use blobsync_sync::engine::{RunOutcome, SyncOrchestrator, SyncTrigger};
use blobsync_sync::network::{NetworkPolicyGate, SysfsNetworkState};
use blobsync_sync::pidfile::{request_sync_now, running_daemon, PidFile};
use blobsync_sync::status::FileStatusReporter;
use clap::Args;
use tracing::info;

use crate::output::{count_label, get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Behave like a scheduled run (honors the auto-sync setting)
    #[arg(long)]
    pub periodic: bool,

    /// Run in this process even when the daemon is running
    #[arg(long)]
    pub local: bool,
}

/// Echoes each status change while the run progresses
struct ProgressObserver;

impl IStatusObserver for ProgressObserver {
    fn on_status_changed(&self, snapshot: &StatusSnapshot) {
        println!("  \u{2192} {}", snapshot.last_sync_status);
    }
}

impl SyncCommand {
    fn trigger(&self) -> SyncTrigger {
        if self.periodic {
            SyncTrigger::periodic()
        } else {
            SyncTrigger::expedited()
        }
    }

    /// Process id of the daemon that should handle this request, if any
    fn daemon_pid(&self, pid_path: &Path) -> Option<i32> {
        if self.local {
            return None;
        }
        running_daemon(pid_path)
    }

    /// Execute the sync command
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let formatter = get_formatter(format);

        if let Some(pid) = self.daemon_pid(&PidFile::default_path()) {
            return self.delegate(formatter.as_ref(), format, pid);
        }

        info!(config_path = %config_path.display(), periodic = self.periodic, "Starting sync");

        let reporter = Arc::new(FileStatusReporter::open(FileStatusReporter::default_path()));
        let orchestrator = SyncOrchestrator::new(
            NetworkPolicyGate::new(Arc::new(SysfsNetworkState::new())),
            Arc::new(AzureObjectStoreFactory::new()),
            reporter.clone(),
        );

        let _progress = if format.is_json() {
            None
        } else {
            Some(reporter.subscribe(Arc::new(ProgressObserver)))
        };

        let source = FileConfigSource::new(config_path);
        let outcome = orchestrator.run_with_source(self.trigger(), &source).await;

        if format.is_json() {
            formatter.print_json(&outcome_json(&outcome));
            return Ok(());
        }

        match &outcome {
            RunOutcome::Disabled => {
                formatter.info("Auto sync is disabled; nothing to do");
            }
            RunOutcome::Skipped(reason) => formatter.warn(reason),
            RunOutcome::Misconfigured(message) | RunOutcome::Failed(message) => {
                formatter.error(message)
            }
            RunOutcome::Completed(result) => print_result(formatter.as_ref(), result),
        }

        Ok(())
    }

    /// Leaves the run to the daemon so uploads stay in one process
    fn delegate(
        &self,
        formatter: &dyn OutputFormatter,
        format: OutputFormat,
        pid: i32,
    ) -> Result<()> {
        if self.periodic {
            // Periodic runs are the daemon's own schedule
            if format.is_json() {
                formatter.print_json(&delegated_json(pid, false));
            } else {
                formatter.info(&format!(
                    "blobsyncd (pid {pid}) already runs periodic syncs; use --local to run one here"
                ));
            }
            return Ok(());
        }

        if let Err(e) = request_sync_now(pid) {
            formatter.error(&format!("{e:#}"));
            return Ok(());
        }

        if format.is_json() {
            formatter.print_json(&delegated_json(pid, true));
        } else {
            formatter.success(&format!("Sync requested from blobsyncd (pid {pid})"));
            formatter.info("Run 'blobsync status --follow' to watch its progress");
        }
        Ok(())
    }
}

fn delegated_json(pid: i32, requested: bool) -> serde_json::Value {
    serde_json::json!({
        "outcome": "delegated",
        "daemon_pid": pid,
        "requested": requested,
    })
}

fn print_result(formatter: &dyn OutputFormatter, result: &SyncResult) {
    formatter.info("");
    for report in &result.directories {
        print_directory(formatter, report);
    }
    formatter.info("");

    let summary = format!(
        "{} uploaded, {} already present, {} failed",
        count_label(result.files_uploaded(), "file"),
        result.files_skipped(),
        result.files_failed()
    );
    if result.any_succeeded {
        formatter.success(&result.status_message);
        formatter.info(&summary);
    } else {
        formatter.error(&format!("{} ({})", result.status_message, summary));
    }
}

fn print_directory(formatter: &dyn OutputFormatter, report: &DirectoryReport) {
    let mark = if report.succeeded() { "\u{2713}" } else { "\u{2717}" };
    formatter.info(&format!(
        "{} {} -> {}",
        mark,
        report.directory.display(),
        report.remote_prefix
    ));
    if !report.enumerated {
        formatter.info("    could not be listed");
    }
    for file in &report.files {
        if let FileOutcome::Failed(reason) = &file.outcome {
            formatter.info(&format!("    {}: {}", file.path.display(), reason));
        }
    }
}

fn outcome_json(outcome: &RunOutcome) -> serde_json::Value {
    let (kind, result) = match outcome {
        RunOutcome::Disabled => ("disabled", None),
        RunOutcome::Skipped(_) => ("skipped", None),
        RunOutcome::Misconfigured(_) => ("misconfigured", None),
        RunOutcome::Failed(_) => ("failed", None),
        RunOutcome::Completed(result) => ("completed", Some(result)),
    };
    serde_json::json!({
        "outcome": kind,
        "status": outcome.status_message(),
        "result": result,
    })
}

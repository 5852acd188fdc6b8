//! Sync orchestrator
//!
//! The [`SyncOrchestrator`] decides whether a triggered run should upload,
//! walks the configured directories, and reports the outcome.
//!
//! ## Run flow
//!
//! ```text
//! Idle ──→ CheckingPolicy ──→ Skipped ──────────────→ Idle
//!                  │
//!                  └──→ Uploading ──→ Reporting ──→ Idle
//! ```
//!
//! 1. **Auto-sync gate**: a periodic trigger with auto-sync disabled returns
//!    immediately without touching the status
//! 2. **Policy**: Wi-Fi only, then VPN only
//! 3. **Upload**: staging directory first, then each configured directory
//! 4. **Report**: "Upload successful" if any directory succeeded, plus the
//!    success time; "Upload failed" otherwise
//!
//! Runs hold a process-wide guard from the policy check until they return to
//! `Idle`. A second trigger waits for the first run to finish, and
//! [`SyncOrchestrator::phase`] always describes the run in progress.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use blobsync_core::config::{SyncConfigSource, SyncConfiguration};
use blobsync_core::domain::errors::DomainError;
use blobsync_core::domain::sync_result::SyncResult;
use blobsync_core::ports::object_store::IObjectStoreFactory;
use blobsync_core::ports::status::IStatusReporter;

use crate::network::NetworkPolicyGate;
use crate::uploader::DirectoryUploader;

// ============================================================================
// Status messages
// ============================================================================

/// Shown when the policy check starts
pub const CHECKING_PREFERENCES: &str = "Checking Sync Preferences ...";

/// Shown when the policy check passed and uploading begins
pub const STARTING_UPLOAD: &str = "Sync preference checks passed, starting upload ...";

/// Shown when Wi-Fi only is enabled and no Wi-Fi is connected
pub const WIFI_SKIP_MESSAGE: &str =
    "Skipping upload because Wi-Fi is not connected and the Wi-Fi Only setting is enabled";

/// Shown when VPN only is enabled and no VPN is active
pub const VPN_SKIP_MESSAGE: &str =
    "Skipping upload because the VPN is not connected and the VPN Only setting is enabled";

/// Shown when the run itself fails for any other reason
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Sync failed because of an unexpected error";

/// Only one run may be past the auto-sync gate at a time in this process
fn upload_guard() -> &'static tokio::sync::Mutex<()> {
    static GUARD: OnceLock<tokio::sync::Mutex<()>> = OnceLock::new();
    GUARD.get_or_init(|| tokio::sync::Mutex::new(()))
}

// ============================================================================
// Triggers and outcomes
// ============================================================================

/// What caused a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTrigger {
    /// Manual "sync now" request; bypasses the auto-sync setting
    pub expedited: bool,
}

impl SyncTrigger {
    /// A scheduled run that honors the auto-sync setting
    pub fn periodic() -> Self {
        Self { expedited: false }
    }

    /// A manual run that ignores the auto-sync setting
    pub fn expedited() -> Self {
        Self { expedited: true }
    }

    /// Combines two pending triggers into one
    pub fn merge(self, other: SyncTrigger) -> Self {
        Self {
            expedited: self.expedited || other.expedited,
        }
    }
}

/// Current position of the orchestrator's state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncPhase {
    #[default]
    Idle,
    CheckingPolicy,
    Skipped,
    Uploading,
    Reporting,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::CheckingPolicy => "checking-policy",
            SyncPhase::Skipped => "skipped",
            SyncPhase::Uploading => "uploading",
            SyncPhase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Periodic trigger ignored because auto-sync is off
    Disabled,
    /// A network policy blocked the upload
    Skipped(String),
    /// Configuration prevented the upload (no container, bad credential)
    Misconfigured(String),
    /// Directories were processed
    Completed(SyncResult),
    /// The run failed unexpectedly
    Failed(String),
}

impl RunOutcome {
    /// The status message this outcome reported, if any
    pub fn status_message(&self) -> Option<&str> {
        match self {
            RunOutcome::Disabled => None,
            RunOutcome::Skipped(msg) | RunOutcome::Misconfigured(msg) | RunOutcome::Failed(msg) => {
                Some(msg)
            }
            RunOutcome::Completed(result) => Some(&result.status_message),
        }
    }
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Trigger-driven sync core
///
/// ## Dependencies
///
/// - `gate`: Wi-Fi / VPN policy answers
/// - `store_factory`: builds an object store from the run's credential
/// - `reporter`: receives status messages and the success time
pub struct SyncOrchestrator {
    gate: NetworkPolicyGate,
    store_factory: Arc<dyn IObjectStoreFactory>,
    reporter: Arc<dyn IStatusReporter>,
    phase: Mutex<SyncPhase>,
}

impl SyncOrchestrator {
    /// Creates a new `SyncOrchestrator`
    ///
    /// # Arguments
    /// * `gate` - Network policy gate
    /// * `store_factory` - Opens the object store for each run
    /// * `reporter` - Status sink
    pub fn new(
        gate: NetworkPolicyGate,
        store_factory: Arc<dyn IObjectStoreFactory>,
        reporter: Arc<dyn IStatusReporter>,
    ) -> Self {
        Self {
            gate,
            store_factory,
            reporter,
            phase: Mutex::new(SyncPhase::Idle),
        }
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: SyncPhase) {
        debug!(%phase, "Sync phase");
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    /// The reporter this orchestrator writes to
    pub fn reporter(&self) -> &Arc<dyn IStatusReporter> {
        &self.reporter
    }

    /// Loads a configuration snapshot from `source` and runs with it
    ///
    /// A snapshot that cannot be loaded is reported as an unexpected error.
    pub async fn run_with_source(
        &self,
        trigger: SyncTrigger,
        source: &dyn SyncConfigSource,
    ) -> RunOutcome {
        match source.snapshot() {
            Ok(config) => self.run(trigger, &config).await,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to load sync configuration");
                self.reporter.update_status(UNEXPECTED_ERROR_MESSAGE);
                RunOutcome::Failed(UNEXPECTED_ERROR_MESSAGE.to_string())
            }
        }
    }

    /// Performs one run against the given configuration snapshot
    ///
    /// Never returns an error: every ending is reported through the status
    /// reporter and summarized in the returned [`RunOutcome`].
    #[tracing::instrument(skip(self, config), fields(run_id = %Uuid::new_v4(), expedited = trigger.expedited))]
    pub async fn run(&self, trigger: SyncTrigger, config: &SyncConfiguration) -> RunOutcome {
        if !trigger.expedited && !config.auto_sync_enabled {
            info!("Auto sync disabled, ignoring periodic trigger");
            return RunOutcome::Disabled;
        }

        let _guard = upload_guard().lock().await;
        debug!("Upload guard acquired");

        let outcome = match self.run_checked(config).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Sync failed");
                self.reporter.update_status(UNEXPECTED_ERROR_MESSAGE);
                RunOutcome::Failed(UNEXPECTED_ERROR_MESSAGE.to_string())
            }
        };

        self.set_phase(SyncPhase::Idle);
        outcome
    }

    async fn run_checked(&self, config: &SyncConfiguration) -> Result<RunOutcome> {
        self.set_phase(SyncPhase::CheckingPolicy);
        self.reporter.update_status(CHECKING_PREFERENCES);

        if let Some(reason) = self.policy_block(config) {
            info!(reason, "Upload skipped by network policy");
            self.set_phase(SyncPhase::Skipped);
            self.reporter.update_status(reason);
            return Ok(RunOutcome::Skipped(reason.to_string()));
        }

        let Some(container_name) = config.container_name() else {
            return Ok(self.misconfigured(DomainError::MissingContainerName));
        };
        let Some(sas_url) = config.sas_credential() else {
            return Ok(self.misconfigured(DomainError::MissingCredential));
        };
        let store = match self.store_factory.open(container_name, sas_url) {
            Ok(store) => store,
            Err(e) => {
                return Ok(self.misconfigured(DomainError::InvalidCredential(
                    e.root_cause().to_string(),
                )))
            }
        };

        self.set_phase(SyncPhase::Uploading);
        self.reporter.update_status(STARTING_UPLOAD);

        let uploader = DirectoryUploader::new(store);
        let mut reports = Vec::new();
        for target in config.upload_targets() {
            reports.push(uploader.upload(&target).await);
        }

        self.set_phase(SyncPhase::Reporting);
        let result = SyncResult::from_reports(reports, Utc::now());
        info!(
            succeeded = result.any_succeeded,
            uploaded = result.files_uploaded(),
            skipped = result.files_skipped(),
            failed = result.files_failed(),
            "Sync run complete"
        );
        self.reporter.update_status(&result.status_message);
        if let Some(at) = result.completed_at {
            self.reporter.record_success(at);
        }

        Ok(RunOutcome::Completed(result))
    }

    /// Returns the skip message if a network policy blocks this run
    fn policy_block(&self, config: &SyncConfiguration) -> Option<&'static str> {
        if config.wifi_only && !self.gate.is_wifi_connected() {
            return Some(WIFI_SKIP_MESSAGE);
        }
        if config.vpn_only && !self.gate.is_vpn_active() {
            return Some(VPN_SKIP_MESSAGE);
        }
        None
    }

    fn misconfigured(&self, err: DomainError) -> RunOutcome {
        let message = err.to_string();
        warn!(error = %message, "Sync configuration incomplete");
        self.reporter.update_status(&message);
        RunOutcome::Misconfigured(message)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use blobsync_core::domain::sync_result::UPLOAD_SUCCESSFUL;
    use blobsync_core::ports::status::IStatusReporter;

    use super::*;
    use crate::status::FileStatusReporter;
    use crate::testing::{MockNetworkState, MockObjectStore, MockStoreFactory, RecordingObserver};

    const SAS: &str = "https://acct.blob.core.windows.net/c?sv=2019-12-12&sig=x";

    struct Harness {
        orchestrator: SyncOrchestrator,
        store: Arc<MockObjectStore>,
        observer: Arc<RecordingObserver>,
    }

    fn harness(network: MockNetworkState) -> Harness {
        let store = Arc::new(MockObjectStore::new());
        let reporter = Arc::new(FileStatusReporter::in_memory());
        let observer = Arc::new(RecordingObserver::default());
        reporter.subscribe(observer.clone()).detach();

        let orchestrator = SyncOrchestrator::new(
            NetworkPolicyGate::new(Arc::new(network)),
            Arc::new(MockStoreFactory::new(store.clone())),
            reporter,
        );
        Harness {
            orchestrator,
            store,
            observer,
        }
    }

    fn config(data_root: &Path, dirs: &[&str]) -> SyncConfiguration {
        SyncConfiguration {
            container_name: Some("c".to_string()),
            sas_credential: Some(SAS.to_string()),
            local_directories: dirs.iter().map(|d| d.to_string()).collect(),
            device_id: "dev1".to_string(),
            wifi_only: false,
            vpn_only: false,
            auto_sync_enabled: true,
            data_root: data_root.to_path_buf(),
            staging_dir: None,
        }
    }

    #[tokio::test]
    async fn test_scenario_uploads_single_file() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::create_dir(root.path().join("B")).unwrap();
        fs::write(root.path().join("A/x.txt"), b"hello").unwrap();

        let h = harness(MockNetworkState::offline());
        let outcome = h
            .orchestrator
            .run(SyncTrigger::periodic(), &config(root.path(), &["A", "B"]))
            .await;

        assert_eq!(h.store.put_count(), 1);
        assert_eq!(h.store.names(), vec!["dev1/A/x.txt"]);
        assert_eq!(outcome.status_message(), Some(UPLOAD_SUCCESSFUL));
        assert_eq!(h.orchestrator.reporter().last_status(), UPLOAD_SUCCESSFUL);
        assert_ne!(h.orchestrator.reporter().last_success_time(), "Unknown");
        assert_eq!(
            h.observer.messages(),
            vec![CHECKING_PREFERENCES, STARTING_UPLOAD, UPLOAD_SUCCESSFUL, UPLOAD_SUCCESSFUL]
        );
        assert_eq!(h.orchestrator.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_staging_directory_uploaded_first() {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("sharedfiles");
        fs::create_dir(&staging).unwrap();
        fs::write(staging.join("s.txt"), b"s").unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::write(root.path().join("A/a.txt"), b"a").unwrap();

        let mut cfg = config(root.path(), &["A"]);
        cfg.staging_dir = Some(staging);

        let h = harness(MockNetworkState::offline());
        let outcome = h.orchestrator.run(SyncTrigger::periodic(), &cfg).await;

        let RunOutcome::Completed(result) = outcome else {
            panic!("expected a completed run");
        };
        assert_eq!(result.directories.len(), 2);
        assert_eq!(
            result.directories[0].remote_prefix.as_str(),
            "/dev1/sharedfiles/"
        );
        assert_eq!(result.directories[1].remote_prefix.as_str(), "/dev1/A/");
        assert_eq!(result.files_uploaded(), 2);
    }

    #[tokio::test]
    async fn test_wifi_only_without_wifi_skips() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::write(root.path().join("A/x.txt"), b"x").unwrap();

        let mut cfg = config(root.path(), &["A"]);
        cfg.wifi_only = true;

        let h = harness(MockNetworkState::offline());
        let outcome = h.orchestrator.run(SyncTrigger::periodic(), &cfg).await;

        assert_eq!(outcome, RunOutcome::Skipped(WIFI_SKIP_MESSAGE.to_string()));
        assert_eq!(h.store.put_count(), 0);
        assert_eq!(h.orchestrator.reporter().last_status(), WIFI_SKIP_MESSAGE);
    }

    #[tokio::test]
    async fn test_vpn_only_checked_after_wifi() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path(), &[]);
        cfg.wifi_only = true;
        cfg.vpn_only = true;

        let h = harness(MockNetworkState::wifi_only());
        let outcome = h.orchestrator.run(SyncTrigger::periodic(), &cfg).await;
        assert_eq!(outcome, RunOutcome::Skipped(VPN_SKIP_MESSAGE.to_string()));

        let h = harness(MockNetworkState::wifi_and_vpn());
        let outcome = h.orchestrator.run(SyncTrigger::periodic(), &cfg).await;
        assert!(matches!(outcome, RunOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_network_unavailable_blocks_policy() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path(), &[]);
        cfg.vpn_only = true;

        let h = harness(MockNetworkState::unavailable());
        let outcome = h.orchestrator.run(SyncTrigger::periodic(), &cfg).await;
        assert_eq!(outcome, RunOutcome::Skipped(VPN_SKIP_MESSAGE.to_string()));
    }

    #[tokio::test]
    async fn test_periodic_trigger_respects_auto_sync() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path(), &[]);
        cfg.auto_sync_enabled = false;

        let h = harness(MockNetworkState::offline());
        let outcome = h.orchestrator.run(SyncTrigger::periodic(), &cfg).await;

        assert_eq!(outcome, RunOutcome::Disabled);
        assert!(h.observer.messages().is_empty());
        assert_eq!(h.orchestrator.reporter().last_status(), "Unknown");
    }

    #[tokio::test]
    async fn test_expedited_trigger_bypasses_auto_sync() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path(), &[]);
        cfg.auto_sync_enabled = false;

        let h = harness(MockNetworkState::offline());
        let outcome = h.orchestrator.run(SyncTrigger::expedited(), &cfg).await;

        assert!(matches!(outcome, RunOutcome::Completed(ref r) if r.any_succeeded));
        assert_eq!(h.orchestrator.reporter().last_status(), UPLOAD_SUCCESSFUL);
        assert_ne!(h.orchestrator.reporter().last_success_time(), "Unknown");
        assert_eq!(h.store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_container_reports_failure() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::write(root.path().join("A/x.txt"), b"x").unwrap();

        let mut cfg = config(root.path(), &["A"]);
        cfg.container_name = Some("  ".to_string());

        let h = harness(MockNetworkState::offline());
        let outcome = h.orchestrator.run(SyncTrigger::expedited(), &cfg).await;

        let expected = "Could not upload any files because the containerName was null";
        assert_eq!(outcome, RunOutcome::Misconfigured(expected.to_string()));
        assert_eq!(h.orchestrator.reporter().last_status(), expected);
        assert_eq!(h.store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_credential_reports_failure() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(root.path(), &[]);

        cfg.sas_credential = None;
        let h = harness(MockNetworkState::offline());
        let outcome = h.orchestrator.run(SyncTrigger::expedited(), &cfg).await;
        assert!(matches!(outcome, RunOutcome::Misconfigured(ref m) if m.contains("SAS URL was not set")));

        cfg.sas_credential = Some("ftp://nope".to_string());
        let outcome = h.orchestrator.run(SyncTrigger::expedited(), &cfg).await;
        assert!(matches!(outcome, RunOutcome::Misconfigured(ref m) if m.ends_with("SAS URL is invalid: unsupported scheme")));
    }

    #[tokio::test]
    async fn test_all_directories_failing_reports_upload_failed() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::write(root.path().join("A/x.txt"), b"x").unwrap();

        let h = harness(MockNetworkState::offline());
        h.store.fail_exists(true);
        let outcome = h
            .orchestrator
            .run(SyncTrigger::periodic(), &config(root.path(), &["A"]))
            .await;

        let RunOutcome::Completed(result) = outcome else {
            panic!("expected a completed run");
        };
        assert!(!result.any_succeeded);
        assert!(result.completed_at.is_none());
        assert_eq!(h.orchestrator.reporter().last_status(), "Upload failed");
        assert_eq!(h.orchestrator.reporter().last_success_time(), "Unknown");
    }

    #[tokio::test]
    async fn test_config_load_failure_reports_unexpected_error() {
        struct BrokenSource;
        impl SyncConfigSource for BrokenSource {
            fn snapshot(&self) -> Result<SyncConfiguration> {
                anyhow::bail!("disk on fire")
            }
        }

        let h = harness(MockNetworkState::offline());
        let outcome = h
            .orchestrator
            .run_with_source(SyncTrigger::expedited(), &BrokenSource)
            .await;

        assert_eq!(
            outcome,
            RunOutcome::Failed(UNEXPECTED_ERROR_MESSAGE.to_string())
        );
        assert_eq!(
            h.orchestrator.reporter().last_status(),
            UNEXPECTED_ERROR_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_concurrent_runs_never_overlap_uploads() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::create_dir(root.path().join("B")).unwrap();
        fs::write(root.path().join("A/a.txt"), b"a").unwrap();
        fs::write(root.path().join("B/b.txt"), b"b").unwrap();

        let h = harness(MockNetworkState::offline());
        h.store.set_put_delay(Duration::from_millis(20));

        let cfg_a = config(root.path(), &["A"]);
        let cfg_b = config(root.path(), &["B"]);
        let (first, second) = tokio::join!(
            h.orchestrator.run(SyncTrigger::expedited(), &cfg_a),
            h.orchestrator.run(SyncTrigger::expedited(), &cfg_b),
        );

        assert!(matches!(first, RunOutcome::Completed(_)));
        assert!(matches!(second, RunOutcome::Completed(_)));
        assert_eq!(h.store.put_count(), 2);
        assert_eq!(h.store.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_phase_tracks_the_run_in_progress() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("A")).unwrap();
        fs::create_dir(root.path().join("B")).unwrap();
        fs::write(root.path().join("A/a.txt"), b"a").unwrap();
        fs::write(root.path().join("B/b.txt"), b"b").unwrap();

        let Harness {
            orchestrator, store, ..
        } = harness(MockNetworkState::offline());
        store.set_put_delay(Duration::from_millis(300));
        let orchestrator = Arc::new(orchestrator);

        let spawn_run = |dir: &'static str| {
            let orchestrator = orchestrator.clone();
            let cfg = config(root.path(), &[dir]);
            tokio::spawn(async move { orchestrator.run(SyncTrigger::expedited(), &cfg).await })
        };

        let first = spawn_run("A");
        tokio::time::timeout(Duration::from_secs(5), async {
            while orchestrator.phase() != SyncPhase::Uploading {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("first run never started uploading");

        // The second run waits for the first instead of resetting its phase
        let second = spawn_run("B");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(orchestrator.phase(), SyncPhase::Uploading);

        assert!(matches!(first.await.unwrap(), RunOutcome::Completed(_)));
        assert!(matches!(second.await.unwrap(), RunOutcome::Completed(_)));
        assert_eq!(orchestrator.phase(), SyncPhase::Idle);
        assert_eq!(store.max_in_flight(), 1);
    }

    #[test]
    fn test_trigger_merge_ors_expedited() {
        assert!(!SyncTrigger::periodic()
            .merge(SyncTrigger::periodic())
            .expedited);
        assert!(SyncTrigger::periodic()
            .merge(SyncTrigger::expedited())
            .expedited);
    }
}

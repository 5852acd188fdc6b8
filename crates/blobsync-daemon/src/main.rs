//! blobsync Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Periodic conditional uploads of the configured directories
//! - Expedited "sync now" requests delivered as `SIGUSR1`
//! - Credential expiry warnings at start-up
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon builds the adapters (sysfs network state, Azure object store
//! factory, file-backed status reporter), wires them into a
//! [`SyncOrchestrator`], and runs a [`SyncScheduler`] until a
//! `CancellationToken` is triggered by SIGTERM or SIGINT.
//!
//! The configuration file is `$XDG_CONFIG_HOME/blobsync/config.yaml` unless
//! `BLOBSYNC_CONFIG` points elsewhere. It is re-read on every trigger.
//!
//! While running, the daemon keeps its process id in a PID file so that
//! `blobsync sync` can signal it instead of uploading from a second process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use blobsync_azure::provider::AzureObjectStoreFactory;
use blobsync_core::config::{expand_tilde, Config, FileConfigSource};
use blobsync_core::domain::credential::CredentialValidity;
use blobsync_sync::engine::SyncOrchestrator;
use blobsync_sync::network::{NetworkPolicyGate, SysfsNetworkState};
use blobsync_sync::pidfile::PidFile;
use blobsync_sync::scheduler::{SyncScheduler, SyncTriggerHandle};
use blobsync_sync::status::FileStatusReporter;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// DaemonService struct
// ============================================================================

/// Main daemon service that owns the scheduler and its collaborators
struct DaemonService {
    /// Configuration loaded at start-up (schedule and logging)
    config: Config,
    /// Path the configuration is re-read from on every trigger
    config_path: PathBuf,
    /// Status reporter shared with the orchestrator
    reporter: Arc<FileStatusReporter>,
    /// Where the process id is recorded while running
    pid_path: PathBuf,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Creates a new DaemonService
    ///
    /// Opens the status file and the PID file at their default locations.
    fn new(config_path: PathBuf, config: Config, shutdown: CancellationToken) -> Self {
        Self::with_state_paths(
            config_path,
            config,
            shutdown,
            FileStatusReporter::default_path(),
            PidFile::default_path(),
        )
    }

    fn with_state_paths(
        config_path: PathBuf,
        config: Config,
        shutdown: CancellationToken,
        status_path: PathBuf,
        pid_path: PathBuf,
    ) -> Self {
        Self {
            config,
            config_path,
            reporter: Arc::new(FileStatusReporter::open(status_path)),
            pid_path,
            shutdown,
        }
    }

    /// Logs whether the configured SAS URL is currently usable
    fn log_credential_validity(&self) {
        let validity =
            CredentialValidity::for_credential(Utc::now(), self.config.storage.sas_url.as_deref());
        if validity.is_valid {
            info!(message = %validity.message, "SAS credential checked");
        } else {
            warn!(message = %validity.message, "SAS credential is not usable");
        }
    }

    /// Creates the staging directory if it is configured and missing
    async fn ensure_staging_dir(&self) {
        if let Some(staging) = &self.config.sync.staging_dir {
            let staging = expand_tilde(staging);
            if let Err(e) = tokio::fs::create_dir_all(&staging).await {
                warn!(path = %staging.display(), error = %e, "Failed to create staging directory");
            }
        }
    }

    // ========================================================================
    // DaemonService::run() - async main loop
    // ========================================================================

    /// Runs the daemon's main loop
    ///
    /// 1. Validates configuration and logs credential validity
    /// 2. Writes the PID file (removed again when this returns)
    /// 3. Creates adapters and the SyncOrchestrator
    /// 4. Installs the SIGUSR1 handler for expedited syncs
    /// 5. Runs the scheduler until shutdown
    async fn run(&self) -> Result<()> {
        for issue in self.config.validate() {
            warn!(field = %issue.field, message = %issue.message, "Configuration issue");
        }
        self.log_credential_validity();
        self.ensure_staging_dir().await;

        let _pid_file = match PidFile::create(&self.pid_path) {
            Ok(pid_file) => Some(pid_file),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Running without a PID file; CLI syncs will run locally");
                None
            }
        };

        let orchestrator = Arc::new(SyncOrchestrator::new(
            NetworkPolicyGate::new(Arc::new(SysfsNetworkState::new())),
            Arc::new(AzureObjectStoreFactory::new()),
            self.reporter.clone(),
        ));

        let period = Duration::from_secs(self.config.schedule.period_secs.max(1));
        let scheduler = SyncScheduler::new(
            orchestrator,
            Arc::new(FileConfigSource::new(self.config_path.clone())),
            period,
        );

        let sync_now = tokio::spawn(sync_now_signal(scheduler.handle(), self.shutdown.clone()));

        info!(
            config_path = %self.config_path.display(),
            period_secs = period.as_secs(),
            "Entering main loop"
        );
        scheduler.run(self.shutdown.clone()).await;

        sync_now.abort();
        Ok(())
    }
}

// ============================================================================
// Signal handling
// ============================================================================

/// Maps SIGUSR1 to an expedited sync request until shutdown
#[cfg(unix)]
async fn sync_now_signal(handle: SyncTriggerHandle, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigusr1 = match signal(SignalKind::user_defined1()) {
        Ok(sig) => sig,
        Err(e) => {
            error!(error = %e, "Failed to install SIGUSR1 handler; sync-now disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = sigusr1.recv() => {
                if received.is_none() {
                    break;
                }
                info!("Received SIGUSR1");
                handle.request_sync(true);
            }
        }
    }
}

#[cfg(not(unix))]
async fn sync_now_signal(_handle: SyncTriggerHandle, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}

/// Waits for a shutdown signal (SIGTERM or SIGINT) and cancels the token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

/// Initializes tracing; `RUST_LOG` wins over the configured level
fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = Config::resolve_path(None);
    let config = Config::load_if_exists(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    init_tracing(&config);
    info!("blobsync daemon starting (blobsyncd)");

    let shutdown_token = CancellationToken::new();

    // Spawn signal handler task
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config_path, config, shutdown_token.clone());
    let result = service.run().await;

    match &result {
        Ok(()) => info!("blobsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "blobsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_owns_pid_file_and_staging_dir_until_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("blobsyncd.pid");
        let staging = dir.path().join("staging");

        // The first tick fires at once; keep it from touching the network
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "sync:\n  auto_sync: false\n").unwrap();

        let mut config = Config::default();
        config.sync.data_root = dir.path().join("data");
        config.sync.staging_dir = Some(staging.clone());
        config.schedule.period_secs = 3600;

        let token = CancellationToken::new();
        let service = DaemonService::with_state_paths(
            config_path,
            config,
            token.clone(),
            dir.path().join("status.json"),
            pid_path.clone(),
        );

        let observe = async {
            for _ in 0..100 {
                if pid_path.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let recorded = std::fs::read_to_string(&pid_path).unwrap();
            assert_eq!(recorded.trim(), std::process::id().to_string());
            assert!(staging.is_dir());
            token.cancel();
        };

        let (result, ()) = tokio::time::timeout(
            Duration::from_secs(10),
            async { tokio::join!(service.run(), observe) },
        )
        .await
        .expect("daemon should stop on shutdown");

        result.unwrap();
        assert!(!pid_path.exists());
    }

    #[tokio::test]
    async fn test_sync_now_listener_stops_on_shutdown() {
        let orchestrator = Arc::new(SyncOrchestrator::new(
            NetworkPolicyGate::new(Arc::new(SysfsNetworkState::with_root("/nonexistent"))),
            Arc::new(AzureObjectStoreFactory::new()),
            Arc::new(FileStatusReporter::in_memory()),
        ));
        let scheduler = SyncScheduler::new(
            orchestrator,
            Arc::new(disabled_config()),
            Duration::from_secs(3600),
        );

        let token = CancellationToken::new();
        let listener = tokio::spawn(sync_now_signal(scheduler.handle(), token.clone()));
        token.cancel();

        tokio::time::timeout(Duration::from_secs(2), listener)
            .await
            .expect("listener should stop on shutdown")
            .unwrap();
    }

    fn disabled_config() -> blobsync_core::config::SyncConfiguration {
        let mut config = blobsync_core::config::SyncConfiguration::from(&Config::default());
        config.auto_sync_enabled = false;
        config
    }
}

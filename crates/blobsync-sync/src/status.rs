//! File-backed status reporter
//!
//! [`FileStatusReporter`] implements [`IStatusReporter`]. It keeps the latest
//! status message and last-success time in memory, writes them to a JSON file
//! so other processes can read them, and notifies subscribed observers after
//! every change.
//!
//! ## File format
//!
//! ```json
//! { "last_sync_status": "Upload successful", "last_success": "2020-10-31 14:15:30 UTC" }
//! ```
//!
//! Writes go to a temporary file that is then renamed over the target, so a
//! reader never sees a partial document.
//!
//! The daemon and the CLI may both hold a reporter for the same file. Each
//! update re-reads the file first and changes only its own field, so one
//! process never writes back another's stale value.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use blobsync_core::config::Config;
use blobsync_core::ports::status::{
    IStatusObserver, IStatusReporter, StatusSnapshot, StatusSubscription,
};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::SyncError;

/// File name of the persisted status under the data directory
pub const STATUS_FILE_NAME: &str = "status.json";

/// Format used for the last-success time
pub const SUCCESS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

type ObserverList = Vec<(u64, Arc<dyn IStatusObserver>)>;

/// Formats a success instant the way it is stored and displayed
pub fn format_success_time(at: DateTime<Utc>) -> String {
    at.format(SUCCESS_TIME_FORMAT).to_string()
}

// ============================================================================
// FileStatusReporter
// ============================================================================

/// Status reporter persisted as JSON
pub struct FileStatusReporter {
    /// Where the snapshot is written; `None` keeps it in memory only
    path: Option<PathBuf>,
    state: Mutex<StatusSnapshot>,
    observers: Arc<Mutex<ObserverList>>,
    next_id: AtomicU64,
}

impl FileStatusReporter {
    /// Default status file location (`<data_local_dir>/blobsync/status.json`)
    pub fn default_path() -> PathBuf {
        Config::data_dir().join(STATUS_FILE_NAME)
    }

    /// Opens a reporter backed by `path`, seeded from the file if it exists
    ///
    /// An unreadable file is logged and replaced on the next update.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let initial = match Self::read_snapshot(&path) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Ignoring unreadable status file");
                StatusSnapshot::default()
            }
        };
        Self::with_state(Some(path), initial)
    }

    /// Creates a reporter that never touches the filesystem
    pub fn in_memory() -> Self {
        Self::with_state(None, StatusSnapshot::default())
    }

    fn with_state(path: Option<PathBuf>, initial: StatusSnapshot) -> Self {
        Self {
            path,
            state: Mutex::new(initial),
            observers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Reads a persisted snapshot
    ///
    /// A missing file yields the default (`Unknown` / `Unknown`).
    pub fn read_snapshot(path: &Path) -> Result<StatusSnapshot> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StatusSnapshot::default())
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse status file {}", path.display()))
    }

    /// The backing file, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock_state(&self) -> MutexGuard<'_, StatusSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn change(&self, apply: impl FnOnce(&mut StatusSnapshot)) {
        let snapshot = {
            let mut state = self.lock_state();
            if let Some(path) = &self.path {
                match Self::read_snapshot(path) {
                    Ok(on_disk) => *state = on_disk,
                    Err(e) => {
                        debug!(error = %format!("{e:#}"), "Keeping in-memory status");
                    }
                }
            }
            apply(&mut state);
            if let Err(e) = self.persist(&state) {
                warn!(error = %e, "Failed to persist status");
            }
            state.clone()
        };

        let observers: Vec<_> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer.on_status_changed(&snapshot);
        }
    }

    fn persist(&self, snapshot: &StatusSnapshot) -> Result<(), SyncError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| SyncError::StatusPersistence(e.to_string()))?;

        let tmp_path = {
            let mut p = path.as_os_str().to_owned();
            p.push(format!(".{}.tmp", std::process::id()));
            PathBuf::from(p)
        };
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        debug!(path = %path.display(), "Status persisted");
        Ok(())
    }
}

impl IStatusReporter for FileStatusReporter {
    fn update_status(&self, message: &str) {
        debug!(status = message, "Status updated");
        self.change(|state| state.last_sync_status = message.to_string());
    }

    fn record_success(&self, at: DateTime<Utc>) {
        let formatted = format_success_time(at);
        debug!(last_success = %formatted, "Success recorded");
        self.change(|state| state.last_success = formatted);
    }

    fn last_status(&self) -> String {
        self.lock_state().last_sync_status.clone()
    }

    fn last_success_time(&self) -> String {
        self.lock_state().last_success.clone()
    }

    fn snapshot(&self) -> StatusSnapshot {
        self.lock_state().clone()
    }

    fn subscribe(&self, observer: Arc<dyn IStatusObserver>) -> StatusSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));

        let observers = Arc::downgrade(&self.observers);
        StatusSubscription::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(existing, _)| *existing != id);
            }
        })
    }
}

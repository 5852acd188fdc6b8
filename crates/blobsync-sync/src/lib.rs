//! blobsync Sync - conditional directory-to-blob synchronization engine
//!
//! Provides:
//! - Network policy gating (Wi-Fi only / VPN only)
//! - A trigger-driven orchestrator with a process-wide upload guard
//! - Dedup-by-existence directory uploads
//! - A single-slot trigger scheduler
//! - File-backed status reporting with observers
//!
//! ## Modules
//!
//! - [`network`] - Network state adapter (sysfs) and the policy gate
//! - [`uploader`] - Per-directory upload procedure
//! - [`engine`] - Sync orchestrator state machine
//! - [`scheduler`] - Periodic and on-demand trigger loop
//! - [`status`] - Status reporter persisted as JSON
//! - [`pidfile`] - Daemon PID file and the sync-now signal

pub mod engine;
pub mod network;
pub mod pidfile;
pub mod scheduler;
pub mod status;
pub mod uploader;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A directory could not be enumerated
    #[error("Failed to enumerate {path}: {message}")]
    Enumeration {
        /// Directory being walked
        path: PathBuf,
        /// Underlying error text
        message: String,
    },

    /// The status file could not be written or parsed
    #[error("Status persistence failed: {0}")]
    StatusPersistence(String),
}

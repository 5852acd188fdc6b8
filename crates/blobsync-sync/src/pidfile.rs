//! PID file shared by the daemon and the CLI
//!
//! The daemon records its process id at start-up. `blobsync sync` reads it
//! and hands a sync-now request to the running daemon with `SIGUSR1`, so
//! uploads never run from two processes at once.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blobsync_core::config::Config;
use tracing::{debug, info};

/// File name of the PID file under the data directory
pub const PID_FILE_NAME: &str = "blobsyncd.pid";

/// PID file owned by the running daemon; removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Default location (`<data_local_dir>/blobsync/blobsyncd.pid`)
    pub fn default_path() -> PathBuf {
        Config::data_dir().join(PID_FILE_NAME)
    }

    /// Writes the current process id to `path`
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, format!("{}\n", std::process::id()))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Failed to remove PID file");
        }
    }
}

/// Process id recorded at `path`, if that process is still alive
pub fn running_daemon(path: &Path) -> Option<libc::pid_t> {
    let content = std::fs::read_to_string(path).ok()?;
    let pid: libc::pid_t = content.trim().parse().ok()?;
    if pid <= 0 {
        return None;
    }
    // Signal 0 only checks that the process exists
    let alive = unsafe { libc::kill(pid, 0) } == 0;
    if !alive {
        debug!(pid, path = %path.display(), "Ignoring stale PID file");
    }
    alive.then_some(pid)
}

/// Asks the daemon with process id `pid` for an expedited sync
pub fn request_sync_now(pid: libc::pid_t) -> Result<()> {
    if unsafe { libc::kill(pid, libc::SIGUSR1) } != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("Failed to signal blobsyncd (pid {pid})"));
    }
    info!(pid, "Sent SIGUSR1 to daemon");
    Ok(())
}

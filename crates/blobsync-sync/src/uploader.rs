//! Per-directory upload procedure
//!
//! For one [`UploadTarget`], enumerate every regular file under the local
//! directory (recursively, symlinks excluded), and for each file:
//!
//! 1. Ask the store whether `remote_prefix + file_name` already exists
//! 2. Skip it if so; objects are never overwritten
//! 3. Otherwise stream the whole file up as a new object
//!
//! Per-file errors are logged and recorded; the loop always moves on to the
//! next file. Uploads are sequential.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use blobsync_core::domain::sync_result::{DirectoryReport, FileOutcome, FileReport};
use blobsync_core::domain::upload_target::{RemotePrefix, UploadTarget};
use blobsync_core::ports::object_store::{IObjectStore, ObjectReader};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::SyncError;

// ============================================================================
// DirectoryUploader
// ============================================================================

/// Uploads the files of one directory into the object store
#[derive(Clone)]
pub struct DirectoryUploader {
    store: Arc<dyn IObjectStore>,
}

impl DirectoryUploader {
    pub fn new(store: Arc<dyn IObjectStore>) -> Self {
        Self { store }
    }

    /// Runs the upload procedure for `target`
    ///
    /// A missing directory is treated as empty. If enumeration fails the
    /// report has `enumerated == false` and no files.
    #[instrument(skip(self, target), fields(directory = %target.local_path.display(), prefix = %target.remote_prefix))]
    pub async fn upload(&self, target: &UploadTarget) -> DirectoryReport {
        let mut report = DirectoryReport {
            directory: target.local_path.clone(),
            remote_prefix: target.remote_prefix.clone(),
            enumerated: false,
            files: Vec::new(),
        };

        let files = match enumerate_files(target.local_path.clone()).await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Skipping directory");
                return report;
            }
        };
        report.enumerated = true;
        debug!(count = files.len(), "Enumerated directory");

        for path in files {
            let outcome = self.upload_file(&target.remote_prefix, &path).await;
            report.files.push(FileReport { path, outcome });
        }

        info!(
            uploaded = report.uploaded_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "Directory processed"
        );
        report
    }

    async fn upload_file(&self, prefix: &RemotePrefix, path: &Path) -> FileOutcome {
        let file_name = match path.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => return FileOutcome::Failed("path has no file name".to_string()),
        };

        match self.store.exists(prefix, &file_name).await {
            Ok(true) => {
                debug!(key = %prefix.key_for(&file_name), "Already uploaded, skipping");
                FileOutcome::AlreadyPresent
            }
            Ok(false) => match self.put_file(prefix, &file_name, path).await {
                Ok(()) => FileOutcome::Uploaded,
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "Upload failed");
                    FileOutcome::Failed(format!("{e:#}"))
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "Existence check failed");
                FileOutcome::Failed(format!("{e:#}"))
            }
        }
    }

    async fn put_file(&self, prefix: &RemotePrefix, file_name: &str, path: &Path) -> Result<()> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let length = file
            .metadata()
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        let reader: ObjectReader = Box::new(file);
        self.store.put(prefix, file_name, reader, length).await?;
        debug!(key = %prefix.key_for(file_name), bytes = length, "Uploaded file");
        Ok(())
    }
}

// ============================================================================
// Enumeration
// ============================================================================

/// Lists regular files under `dir` on the blocking pool
async fn enumerate_files(dir: PathBuf) -> Result<Vec<PathBuf>, SyncError> {
    let path = dir.clone();
    tokio::task::spawn_blocking(move || list_regular_files(&dir))
        .await
        .map_err(|e| SyncError::Enumeration {
            path,
            message: e.to_string(),
        })?
}

/// Recursively collects regular files, sorted by path
///
/// Symlinks are not followed and not returned. Unreadable entries below the
/// root are logged and skipped.
fn list_regular_files(dir: &Path) -> Result<Vec<PathBuf>, SyncError> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(SyncError::Enumeration {
                path: dir.to_path_buf(),
                message: "not a directory".to_string(),
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %dir.display(), "Directory does not exist, nothing to upload");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(SyncError::Enumeration {
                    path: dir.to_path_buf(),
                    message: e.to_string(),
                })
            }
            Err(e) => warn!(error = %e, "Skipping unreadable entry"),
        }
    }
    Ok(files)
}

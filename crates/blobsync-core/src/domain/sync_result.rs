//! Results of a synchronization run
//!
//! A run produces exactly one [`SyncResult`]. It is built by the orchestrator,
//! handed to the status reporter, and then discarded.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::upload_target::RemotePrefix;

/// Status message for a run in which at least one directory succeeded.
pub const UPLOAD_SUCCESSFUL: &str = "Upload successful";

/// Status message for a run in which no directory succeeded.
pub const UPLOAD_FAILED: &str = "Upload failed";

/// What happened to a single file during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum FileOutcome {
    /// The file was transferred as a new object
    Uploaded,
    /// An object with the same name already existed under the prefix
    AlreadyPresent,
    /// The existence check or the transfer failed
    Failed(String),
}

impl FileOutcome {
    /// Returns true unless the outcome is [`FileOutcome::Failed`]
    pub fn is_ok(&self) -> bool {
        !matches!(self, FileOutcome::Failed(_))
    }
}

/// Outcome of one file, keyed by its local path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Per-directory result of the upload procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryReport {
    /// Local directory that was processed
    pub directory: PathBuf,
    /// Remote prefix its files were placed under
    pub remote_prefix: RemotePrefix,
    /// Whether the directory listing completed
    pub enumerated: bool,
    /// One entry per regular file found
    pub files: Vec<FileReport>,
}

impl DirectoryReport {
    /// A directory succeeds when it was enumerated and either no file was
    /// attempted or at least one file did not fail.
    pub fn succeeded(&self) -> bool {
        self.enumerated && (self.files.is_empty() || self.files.iter().any(|f| f.outcome.is_ok()))
    }

    /// Number of files transferred in this directory
    pub fn uploaded_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Uploaded))
    }

    /// Number of files skipped because they already existed remotely
    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::AlreadyPresent))
    }

    /// Number of files whose check or transfer failed
    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// Summary of a completed upload run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// True if at least one directory succeeded
    pub any_succeeded: bool,
    /// Short message shown to users
    pub status_message: String,
    /// Completion time, present only for successful runs
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-directory details, in processing order
    pub directories: Vec<DirectoryReport>,
}

impl SyncResult {
    /// Aggregates directory reports into a run result.
    ///
    /// A run with nothing to upload succeeds, like an empty directory does.
    pub fn from_reports(directories: Vec<DirectoryReport>, now: DateTime<Utc>) -> Self {
        let any_succeeded =
            directories.is_empty() || directories.iter().any(DirectoryReport::succeeded);
        Self {
            any_succeeded,
            status_message: if any_succeeded {
                UPLOAD_SUCCESSFUL
            } else {
                UPLOAD_FAILED
            }
            .to_string(),
            completed_at: any_succeeded.then_some(now),
            directories,
        }
    }

    /// Total number of files transferred
    pub fn files_uploaded(&self) -> usize {
        self.directories.iter().map(DirectoryReport::uploaded_count).sum()
    }

    /// Total number of files skipped as already present
    pub fn files_skipped(&self) -> usize {
        self.directories.iter().map(DirectoryReport::skipped_count).sum()
    }

    /// Total number of failed files
    pub fn files_failed(&self) -> usize {
        self.directories.iter().map(DirectoryReport::failed_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(enumerated: bool, outcomes: Vec<FileOutcome>) -> DirectoryReport {
        DirectoryReport {
            directory: PathBuf::from("/data/A"),
            remote_prefix: RemotePrefix::for_directory("dev1", "A"),
            enumerated,
            files: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| FileReport {
                    path: PathBuf::from(format!("/data/A/{i}.txt")),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn run_without_targets_succeeds() {
        let now = Utc::now();
        let result = SyncResult::from_reports(Vec::new(), now);
        assert!(result.any_succeeded);
        assert_eq!(result.status_message, UPLOAD_SUCCESSFUL);
        assert_eq!(result.completed_at, Some(now));
    }

    #[test]
    fn empty_enumerated_directory_succeeds() {
        assert!(report(true, vec![]).succeeded());
    }

    #[test]
    fn unenumerated_directory_fails() {
        assert!(!report(false, vec![]).succeeded());
    }

    #[test]
    fn all_failed_directory_fails() {
        let r = report(
            true,
            vec![
                FileOutcome::Failed("boom".into()),
                FileOutcome::Failed("boom".into()),
            ],
        );
        assert!(!r.succeeded());
        assert_eq!(r.failed_count(), 2);
    }

    #[test]
    fn partial_failure_still_succeeds() {
        let r = report(
            true,
            vec![FileOutcome::AlreadyPresent, FileOutcome::Failed("boom".into())],
        );
        assert!(r.succeeded());
        assert_eq!(r.skipped_count(), 1);
    }

    #[test]
    fn result_aggregates_directories() {
        let now = Utc::now();
        let ok = SyncResult::from_reports(
            vec![
                report(false, vec![]),
                report(true, vec![FileOutcome::Uploaded, FileOutcome::AlreadyPresent]),
            ],
            now,
        );
        assert!(ok.any_succeeded);
        assert_eq!(ok.status_message, UPLOAD_SUCCESSFUL);
        assert_eq!(ok.completed_at, Some(now));
        assert_eq!(ok.files_uploaded(), 1);
        assert_eq!(ok.files_skipped(), 1);

        let failed = SyncResult::from_reports(vec![report(false, vec![])], now);
        assert!(!failed.any_succeeded);
        assert_eq!(failed.status_message, UPLOAD_FAILED);
        assert!(failed.completed_at.is_none());
    }

    #[test]
    fn file_outcome_serializes_tagged() {
        let json = serde_json::to_value(FileOutcome::Failed("timeout".into())).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "timeout");
    }
}

//! Upload targets and the remote key layout
//!
//! Every local directory maps to a remote prefix of the form
//! `/{device_id}/{last_path_component}/`. Files found anywhere below the
//! directory are stored directly under that prefix, keyed by file name only.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Returns the last `/`-separated component of a directory path.
///
/// Trailing separators are ignored, so `"/data/Survey/"` and `"/data/Survey"`
/// both yield `"Survey"`.
#[must_use]
pub fn last_path_component(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}

// ============================================================================
// RemotePrefix
// ============================================================================

/// Logical folder in the object store under which a directory's files live.
///
/// Always begins and ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePrefix(String);

impl RemotePrefix {
    /// Create a new RemotePrefix
    ///
    /// # Errors
    /// Returns error if the prefix does not start and end with `/`
    pub fn new(prefix: String) -> Result<Self, DomainError> {
        if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
            return Err(DomainError::InvalidRemotePrefix(prefix));
        }
        Ok(Self(prefix))
    }

    /// Builds `/{device_id}/{last_path_component(local_directory)}/`.
    #[must_use]
    pub fn for_directory(device_id: &str, local_directory: &str) -> Self {
        Self(format!(
            "/{}/{}/",
            device_id,
            last_path_component(local_directory)
        ))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix without its leading `/`, as stored by the object store.
    #[must_use]
    pub fn as_store_prefix(&self) -> &str {
        &self.0[1..]
    }

    /// Full key of a file placed under this prefix, e.g. `/dev1/A/x.txt`.
    #[must_use]
    pub fn key_for(&self, file_name: &str) -> String {
        format!("{}{}", self.0, file_name)
    }

    /// Object name of a file under this prefix, without the leading `/`.
    #[must_use]
    pub fn store_name_for(&self, file_name: &str) -> String {
        format!("{}{}", self.as_store_prefix(), file_name)
    }
}

impl Display for RemotePrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RemotePrefix {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePrefix> for String {
    fn from(prefix: RemotePrefix) -> Self {
        prefix.0
    }
}

// ============================================================================
// UploadTarget
// ============================================================================

/// A local directory paired with the remote prefix it uploads into.
///
/// Recomputed for every run from the current configuration snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Absolute path of the local directory
    pub local_path: PathBuf,
    /// Destination prefix in the object store
    pub remote_prefix: RemotePrefix,
}

impl UploadTarget {
    /// Creates a target for `local_path` owned by `device_id`.
    pub fn new(local_path: impl Into<PathBuf>, device_id: &str) -> Self {
        let local_path = local_path.into();
        let remote_prefix =
            RemotePrefix::for_directory(device_id, &local_path.to_string_lossy());
        Self {
            local_path,
            remote_prefix,
        }
    }

    /// Resolves a colon-delimited directory list against `data_root`.
    ///
    /// Empty segments are skipped; declared order is preserved.
    pub fn from_directory_list(data_root: &Path, directories: &str, device_id: &str) -> Vec<Self> {
        directories
            .split(':')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| Self::new(data_root.join(segment), device_id))
            .collect()
    }
}

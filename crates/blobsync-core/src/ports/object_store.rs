//! Object store port (driven/secondary port)
//!
//! This module defines the narrow capability the sync engine needs from a
//! remote blob store: list objects under a prefix, check whether a named
//! object exists, and upload a stream as a new object.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - Object names exposed by [`IObjectStore::list`] never carry a leading `/`;
//!   prefixes are passed as [`RemotePrefix`] and stripped by the adapter.

use tokio::io::AsyncRead;

use crate::domain::upload_target::RemotePrefix;

/// Streaming body handed to [`IObjectStore::put`]
pub type ObjectReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// A single object returned by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full object name, without a leading `/` (e.g. `dev1/A/x.txt`)
    pub name: String,
    /// Content length in bytes, when reported by the store
    pub size: Option<u64>,
}

// ============================================================================
// IObjectStore trait
// ============================================================================

/// Port trait for remote object storage operations
///
/// ## Implementation Notes
///
/// - `exists` must match on the exact object name `prefix + file_name`;
///   content is never compared.
/// - `put` creates a new object. Callers only invoke it after `exists`
///   returned false, so overwrite semantics are unspecified.
/// - No retries are expected at this level; transient failures surface as
///   errors and the caller moves on to the next file.
#[async_trait::async_trait]
pub trait IObjectStore: Send + Sync {
    /// Lists every object whose name starts with `prefix`
    ///
    /// # Arguments
    /// * `prefix` - Remote folder to list
    ///
    /// # Returns
    /// All matching objects, following pagination to the end
    async fn list(&self, prefix: &RemotePrefix) -> anyhow::Result<Vec<ObjectInfo>>;

    /// Checks whether `prefix + file_name` already exists
    ///
    /// # Arguments
    /// * `prefix` - Remote folder to look in
    /// * `file_name` - Bare file name (no directories)
    async fn exists(&self, prefix: &RemotePrefix, file_name: &str) -> anyhow::Result<bool>;

    /// Uploads `length` bytes from `reader` as `prefix + file_name`
    ///
    /// # Arguments
    /// * `prefix` - Remote folder to upload into
    /// * `file_name` - Bare file name (no directories)
    /// * `reader` - Source of the object content
    /// * `length` - Exact number of bytes `reader` will yield
    async fn put(
        &self,
        prefix: &RemotePrefix,
        file_name: &str,
        reader: ObjectReader,
        length: u64,
    ) -> anyhow::Result<()>;
}

/// Builds an [`IObjectStore`] from the credential in the current configuration
///
/// Configuration is re-read on every trigger, so the store is rebuilt per run
/// rather than held for the life of the process.
pub trait IObjectStoreFactory: Send + Sync {
    /// Opens a store for `container_name` using the SAS URL `sas_url`
    ///
    /// # Errors
    /// Returns an error if the credential is malformed
    fn open(
        &self,
        container_name: &str,
        sas_url: &str,
    ) -> anyhow::Result<std::sync::Arc<dyn IObjectStore>>;
}

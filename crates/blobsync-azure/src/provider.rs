//! AzureObjectStore - IObjectStore implementation for Azure Blob Storage
//!
//! Wraps the [`BlobContainerClient`] to fulfil the [`IObjectStore`] port
//! contract. Remote prefixes arrive as [`RemotePrefix`] (leading `/`) and are
//! translated to store names (no leading `/`) here.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use blobsync_core::domain::upload_target::RemotePrefix;
use blobsync_core::ports::object_store::{
    IObjectStore, IObjectStoreFactory, ObjectInfo, ObjectReader,
};

use crate::client::BlobContainerClient;

// ============================================================================
// AzureObjectStore
// ============================================================================

/// Object store backed by one Azure blob container
pub struct AzureObjectStore {
    client: BlobContainerClient,
}

impl AzureObjectStore {
    /// Creates a store over an existing client
    pub fn new(client: BlobContainerClient) -> Self {
        Self { client }
    }

    /// Creates a store from a container SAS URL
    pub fn from_sas_url(sas_url: &str) -> Result<Self> {
        Ok(Self::new(BlobContainerClient::from_sas_url(sas_url)?))
    }

    /// Returns the underlying client
    pub fn client(&self) -> &BlobContainerClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IObjectStore for AzureObjectStore {
    async fn list(&self, prefix: &RemotePrefix) -> Result<Vec<ObjectInfo>> {
        self.client
            .list_blobs(prefix.as_store_prefix())
            .await
            .with_context(|| format!("Failed to list blobs under {prefix}"))
    }

    async fn exists(&self, prefix: &RemotePrefix, file_name: &str) -> Result<bool> {
        let found = self
            .client
            .blob_exists(prefix.as_store_prefix(), file_name)
            .await
            .with_context(|| format!("Failed to check for {}", prefix.key_for(file_name)))?;
        debug!(blob = %prefix.store_name_for(file_name), found, "Existence check");
        Ok(found)
    }

    async fn put(
        &self,
        prefix: &RemotePrefix,
        file_name: &str,
        reader: ObjectReader,
        length: u64,
    ) -> Result<()> {
        self.client
            .put_block_blob(&prefix.store_name_for(file_name), reader, length)
            .await
            .with_context(|| format!("Failed to upload {}", prefix.key_for(file_name)))
    }
}

// ============================================================================
// AzureObjectStoreFactory
// ============================================================================

/// Opens an [`AzureObjectStore`] from configured credentials
#[derive(Debug, Default, Clone, Copy)]
pub struct AzureObjectStoreFactory;

impl AzureObjectStoreFactory {
    pub fn new() -> Self {
        Self
    }
}

impl IObjectStoreFactory for AzureObjectStoreFactory {
    fn open(&self, container_name: &str, sas_url: &str) -> Result<Arc<dyn IObjectStore>> {
        let store = AzureObjectStore::from_sas_url(sas_url)?;

        // The SAS URL addresses the container; a mismatch usually means a stale setting
        let sas_container = store.client().container_name();
        if sas_container != container_name {
            warn!(
                configured = container_name,
                sas_container, "Configured container name differs from the SAS URL container"
            );
        }

        Ok(Arc::new(store))
    }
}

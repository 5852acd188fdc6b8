//! blobsync Azure - Azure Blob Storage adapter
//!
//! Provides an async client for a single blob container addressed by a
//! container SAS URL:
//! - Listing blobs under a prefix (with `NextMarker` pagination)
//! - Existence checks by exact blob name
//! - Streaming block-blob uploads
//!
//! ## Modules
//!
//! - [`sas`] - SAS URL parsing (container URL, token, signed start/expiry)
//! - [`client`] - Blob service REST client
//! - [`provider`] - `IObjectStore` implementation over the client

pub mod client;
pub mod provider;
pub mod sas;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when communicating with Azure Blob Storage
#[derive(Debug, Error)]
pub enum AzureError {
    /// The SAS URL could not be parsed
    #[error("Invalid SAS URL: {0}")]
    InvalidSasUrl(String),

    /// The SAS signature was rejected or has expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The SAS token lacks the permission for this operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The container does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus {
        /// HTTP status code returned
        status: StatusCode,
        /// Response body, truncated
        message: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The listing response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl AzureError {
    /// Maps a non-success HTTP status and body to an error variant
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => AzureError::Unauthorized(body),
            StatusCode::FORBIDDEN => AzureError::Forbidden(body),
            StatusCode::NOT_FOUND => AzureError::NotFound(body),
            s if s.is_server_error() => AzureError::ServerError(body),
            status => AzureError::UnexpectedStatus {
                status,
                message: body,
            },
        }
    }
}

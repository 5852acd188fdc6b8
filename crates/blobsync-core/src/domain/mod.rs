//! Domain entities and business logic
//!
//! This module contains the core domain types for blobsync:
//! - Upload targets and remote key layout
//! - Per-run sync results and per-file outcomes
//! - SAS credential validity computation
//! - Domain-specific error types

pub mod credential;
pub mod errors;
pub mod sync_result;
pub mod upload_target;

// Re-export commonly used types
pub use credential::{
    expiration_message, parse_restricted_date, try_parse_restricted_date, CredentialValidity,
    NO_SAS_URL_WARNING, UNKNOWN_VALIDITY_WARNING,
};
pub use errors::DomainError;
pub use sync_result::{
    DirectoryReport, FileOutcome, FileReport, SyncResult, UPLOAD_FAILED, UPLOAD_SUCCESSFUL,
};
pub use upload_target::{last_path_component, RemotePrefix, UploadTarget};

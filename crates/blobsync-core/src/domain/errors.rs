//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including configuration failures and malformed values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The storage container name is not configured
    #[error("Could not upload any files because the containerName was null")]
    MissingContainerName,

    /// The SAS credential is not configured
    #[error("Could not upload any files because the SAS URL was not set")]
    MissingCredential,

    /// The SAS credential could not be parsed
    #[error("Could not upload any files because the SAS URL is invalid: {0}")]
    InvalidCredential(String),

    /// A date string did not match any accepted format
    #[error("Invalid date format: {0}")]
    FormatError(String),

    /// A remote prefix violates the `/.../` shape
    #[error("Invalid remote prefix: {0}")]
    InvalidRemotePrefix(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::MissingContainerName;
        assert_eq!(
            err.to_string(),
            "Could not upload any files because the containerName was null"
        );

        let err = DomainError::FormatError("Oct 31 2020".to_string());
        assert_eq!(err.to_string(), "Invalid date format: Oct 31 2020");

        let err = DomainError::InvalidRemotePrefix("dev1/A".to_string());
        assert_eq!(err.to_string(), "Invalid remote prefix: dev1/A");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidCredential("x".to_string());
        let err2 = DomainError::InvalidCredential("x".to_string());
        let err3 = DomainError::InvalidCredential("y".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}

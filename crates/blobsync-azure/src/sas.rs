//! SAS URL parsing
//!
//! A container SAS URL looks like
//! `https://<account>.blob.core.windows.net/<container>?sv=...&st=...&se=...&sp=...&sig=...`.
//! The path addresses the container; the query string is the token that must
//! accompany every request.

use url::Url;

use crate::AzureError;

/// A parsed container SAS URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SasUrl {
    /// Container URL with the query removed
    container_url: Url,
    /// Raw SAS query string (without the leading `?`)
    token: String,
}

impl SasUrl {
    /// Parses a container SAS URL
    ///
    /// # Errors
    /// Returns [`AzureError::InvalidSasUrl`] if the URL is malformed, is not
    /// http(s), has no container path, or carries no query token.
    pub fn parse(raw: &str) -> Result<Self, AzureError> {
        let mut url =
            Url::parse(raw.trim()).map_err(|e| AzureError::InvalidSasUrl(e.to_string()))?;

        if !matches!(url.scheme(), "https" | "http") {
            return Err(AzureError::InvalidSasUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let token = match url.query() {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => {
                return Err(AzureError::InvalidSasUrl(
                    "missing SAS token query string".to_string(),
                ))
            }
        };

        url.set_query(None);
        url.set_fragment(None);

        let sas = Self {
            container_url: url,
            token,
        };
        if sas.container_name().is_empty() {
            return Err(AzureError::InvalidSasUrl(
                "missing container name in path".to_string(),
            ));
        }

        Ok(sas)
    }

    /// Builds a SAS URL from an explicit container URL and token
    ///
    /// Used when pointing the client at a local endpoint.
    pub fn from_parts(container_url: &str, token: &str) -> Result<Self, AzureError> {
        Self::parse(&format!(
            "{}?{}",
            container_url.trim_end_matches('/'),
            token.trim_start_matches('?')
        ))
    }

    /// Container URL without the token
    pub fn container_url(&self) -> &Url {
        &self.container_url
    }

    /// SAS token query string
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Last non-empty path segment of the container URL
    pub fn container_name(&self) -> &str {
        self.container_url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
    }
}

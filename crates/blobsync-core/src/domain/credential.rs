//! SAS credential validity
//!
//! A SAS (shared access signature) URL carries its own validity window in the
//! `st` (signed start) and `se` (signed expiry) query parameters. This module
//! parses those timestamps and turns `{now, valid_from, valid_until}` into a
//! short message suitable for a status line.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::errors::DomainError;

/// Message shown when no SAS URL is configured.
pub const NO_SAS_URL_WARNING: &str = "No SAS URL set";

/// Message shown when the SAS URL carries no parseable validity window.
pub const UNKNOWN_VALIDITY_WARNING: &str = "SAS URL validity period unknown";

/// Query parameter holding the signed start time.
const SIGNED_START_PARAM: &str = "st";

/// Query parameter holding the signed expiry time.
const SIGNED_EXPIRY_PARAM: &str = "se";

// ============================================================================
// Restricted date parsing
// ============================================================================

/// Parses a timestamp in one of the shapes used by SAS `st` / `se` values.
///
/// Accepted shapes:
/// - `YYYY-MM-DD` (interpreted as midnight UTC)
/// - `YYYY-MM-DDTHH:MM<zone>`
/// - `YYYY-MM-DDTHH:MM:SS<zone>`
///
/// where `<zone>` is `Z` or `±HH:MM`. Anything else yields
/// [`DomainError::FormatError`].
pub fn try_parse_restricted_date(input: &str) -> Result<DateTime<Utc>, DomainError> {
    let input = input.trim();

    if input.len() == 10 {
        return NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
            .ok_or_else(|| DomainError::FormatError(input.to_string()));
    }

    let normalized = match input.strip_suffix('Z') {
        Some(rest) => format!("{rest}+00:00"),
        None => input.to_string(),
    };

    ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M:%S%:z"]
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| DomainError::FormatError(input.to_string()))
}

/// Lenient wrapper around [`try_parse_restricted_date`].
///
/// Format errors are logged and mapped to `None`; callers treat a missing
/// date as an unknown validity window rather than a failure.
pub fn parse_restricted_date(input: &str) -> Option<DateTime<Utc>> {
    match try_parse_restricted_date(input) {
        Ok(dt) => Some(dt),
        Err(e) => {
            warn!(input, error = %e, "Could not parse SAS URL date");
            None
        }
    }
}

// ============================================================================
// CredentialValidity
// ============================================================================

/// Validity of a SAS credential at a point in time.
///
/// Ephemeral: computed on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialValidity {
    /// Whether the credential can be used right now
    pub is_valid: bool,
    /// Short human-readable explanation
    pub message: String,
}

impl CredentialValidity {
    fn new(is_valid: bool, message: impl Into<String>) -> Self {
        Self {
            is_valid,
            message: message.into(),
        }
    }

    /// Computes validity for a whole SAS URL.
    ///
    /// # Arguments
    /// * `now` - The reference instant
    /// * `sas_url` - The configured SAS URL, if any
    ///
    /// # Returns
    /// `"No SAS URL set"` when absent, a neutral warning when the `st` / `se`
    /// parameters are missing or malformed, and [`expiration_message`]
    /// otherwise.
    pub fn for_credential(now: DateTime<Utc>, sas_url: Option<&str>) -> Self {
        let sas_url = match sas_url.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s,
            None => return Self::new(false, NO_SAS_URL_WARNING),
        };

        let url = match Url::parse(sas_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "SAS URL is not a valid URL");
                return Self::new(false, UNKNOWN_VALIDITY_WARNING);
            }
        };

        let query_date = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .and_then(|(_, value)| parse_restricted_date(&value))
        };

        match (query_date(SIGNED_START_PARAM), query_date(SIGNED_EXPIRY_PARAM)) {
            (Some(valid_from), Some(valid_until)) => {
                expiration_message(now, valid_from, valid_until)
            }
            _ => {
                warn!("Could not get the start or expiration date for the SAS URL");
                Self::new(false, UNKNOWN_VALIDITY_WARNING)
            }
        }
    }
}

/// Builds the validity message for a credential window.
///
/// Day counts are whole days, truncated toward zero.
pub fn expiration_message(
    now: DateTime<Utc>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> CredentialValidity {
    if now < valid_from {
        let days = (valid_from - now).num_days();
        let message = match days {
            0 => "SAS URL not yet within valid date range".to_string(),
            1 => "SAS URL not valid until 1 day from now".to_string(),
            n => format!("SAS URL not valid until {n} days from now"),
        };
        CredentialValidity::new(false, message)
    } else if now > valid_from && now < valid_until {
        let days = (valid_until - now).num_days();
        let message = match days {
            0 => "SAS URL expires today".to_string(),
            1 => "SAS URL expires tomorrow".to_string(),
            n => format!("SAS URL expires in {n} days"),
        };
        CredentialValidity::new(true, message)
    } else {
        CredentialValidity::new(false, "SAS URL is expired")
    }
}

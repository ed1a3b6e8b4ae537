//! Error types for the employee directory client.
//!
//! # Design
//! `FetchError` is the complete set of ways a fetch attempt can end without
//! a list. The kinds are mutually exclusive and terminal for the attempt.
//! Per-record problems never show up here; they degrade to invalid
//! employees instead. `TransportError` is what a `Transport` reports and is
//! carried unchanged inside `FetchError::Network` for diagnostics.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a `Transport` implementation.
#[derive(Debug, Error)]
#[error("transport failed: {source}")]
pub struct TransportError {
    #[source]
    source: BoxError,
}

impl TransportError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// Errors returned by `DirectoryClient::fetch_employees`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The endpoint URL could not be composed from the configured base URL.
    #[error("invalid base url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The transport succeeded but the response had no body.
    #[error("response contained no data")]
    NoData,

    /// The body is not well-formed JSON.
    #[error("response body is not valid JSON: {0}")]
    JsonParsingFailed(#[source] serde_json::Error),

    /// The body is JSON but its top-level value is not an object.
    #[error("response is not a JSON object")]
    InvalidResponseFormat,

    #[error(transparent)]
    Network(#[from] TransportError),
}

impl FetchError {
    /// Text suitable for showing to a user in place of the employee list.
    pub fn user_message(&self) -> &'static str {
        match self {
            FetchError::InvalidUrl { .. } => "The employee directory address is not valid.",
            FetchError::NoData => "The server did not return any employee data.",
            FetchError::JsonParsingFailed(_) => "The employee data could not be read.",
            FetchError::InvalidResponseFormat => "The employee data was in an unexpected format.",
            FetchError::Network(_) => {
                "Unable to reach the employee directory. Check your connection and try again."
            }
        }
    }
}

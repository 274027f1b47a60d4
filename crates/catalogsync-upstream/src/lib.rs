//! Reference adapter for the upstream multi-dimensional table service.
//!
//! Not named as its own component in the sync core's contract (spec
//! §6.2 treats it as a pure trait), but a buildable workspace needs one
//! concrete implementation to exercise `UpstreamTableClient` end to
//! end. Talks to a Bitable-style REST API: static app id/secret
//! credentials exchanged for a short-lived tenant access token,
//! cursor-paged record listing, and batched attachment-token
//! resolution.
//!
//! ## Modules
//!
//! - [`auth`] - tenant access token acquisition and transparent refresh
//! - [`client`] - the `UpstreamTableClient` implementation

pub mod auth;
pub mod client;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the upstream table API.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Credentials were rejected or the access token has expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The requested table or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded; retry after the specified duration.
    #[error("too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying.
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx).
    #[error("server error: {0}")]
    ServerError(String),

    /// A network-level error occurred.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The response body could not be parsed or was malformed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl UpstreamError {
    /// Classifies this error into the three buckets `catalogsync-retry`
    /// distinguishes (spec §6.2, §4.4).
    #[must_use]
    pub fn classify(&self) -> catalogsync_retry::ErrorClass {
        use catalogsync_retry::ErrorClass;
        match self {
            UpstreamError::Unauthorized(_) => ErrorClass::AuthExpired,
            UpstreamError::NotFound(_) | UpstreamError::InvalidResponse(_) => ErrorClass::Fatal,
            UpstreamError::TooManyRequests { .. } | UpstreamError::ServerError(_) => {
                ErrorClass::Retryable
            }
            UpstreamError::NetworkError(_) => ErrorClass::Retryable,
        }
    }
}

//! Remote asset fetch error types.

use thiserror::Error;

/// Errors while downloading a remote asset.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum FetchError {
    #[error("request failed: {message}")]
    Network { message: String },

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("payload too large: {size} bytes exceeds limit of {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("response body is empty")]
    Empty,
}

impl FetchError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}

//! Extraction error types.

use thiserror::Error;

/// Extractor error variants.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ExtractError {
    #[error("{extractor} request failed: {message}")]
    Network { extractor: String, message: String },

    #[error("{extractor} returned an error: {message}")]
    Service { extractor: String, message: String },

    #[error("{extractor} returned an unexpected response: {message}")]
    UnexpectedResponse { extractor: String, message: String },

    #[error("invalid extractor configuration: {message}")]
    Config { message: String },
}

impl ExtractError {
    /// Creates network error.
    #[must_use]
    pub fn network(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            extractor: extractor.into(),
            message: message.into(),
        }
    }

    /// Creates service error.
    #[must_use]
    pub fn service(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            extractor: extractor.into(),
            message: message.into(),
        }
    }

    /// Creates configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates unexpected response error.
    #[must_use]
    pub fn unexpected(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            extractor: extractor.into(),
            message: message.into(),
        }
    }
}

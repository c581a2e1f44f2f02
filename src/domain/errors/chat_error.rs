//! Chat platform error types.

use thiserror::Error;

/// Errors returned by the outbound chat port.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ChatError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
}

impl ChatError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates rejected error.
    #[must_use]
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

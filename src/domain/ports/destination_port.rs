//! Port for durable, name-addressed byte storage.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::DestinationError;

/// Durable storage reachable under a public base URL.
///
/// Implementations must be safe for concurrent use and must reject names
/// containing path separators before touching storage.
#[async_trait]
pub trait Destination: Send + Sync + std::fmt::Display {
    /// Stores `content` under `name`, replacing any existing object.
    async fn upload(&self, name: &str, content: Bytes) -> Result<(), DestinationError>;

    /// Reads the object stored under `name`.
    ///
    /// Returns `DestinationError::NotFound` when nothing is stored there.
    async fn download(&self, name: &str) -> Result<Bytes, DestinationError>;

    /// Releases resources held by the destination.
    async fn close(&self) -> Result<(), DestinationError> {
        Ok(())
    }
}

//! Port for downloading remote assets with a size bound.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::FetchError;

/// Downloads a remote asset into memory.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetches `url`, failing with `FetchError::TooLarge` once more than
    /// `max_bytes` would be buffered.
    async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Bytes, FetchError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    /// Serves canned bodies by URL; unknown URLs answer 404.
    #[derive(Default)]
    pub struct MockFetcher {
        bodies: HashMap<String, Bytes>,
    }

    impl MockFetcher {
        /// Creates a fetcher with no bodies.
        pub fn new() -> Self {
            Self::default()
        }

        /// Registers a body for a URL.
        #[must_use]
        pub fn with_body(mut self, url: &str, body: impl Into<Bytes>) -> Self {
            self.bodies.insert(url.to_string(), body.into());
            self
        }
    }

    #[async_trait]
    impl AssetFetcher for MockFetcher {
        async fn fetch(&self, url: &str, max_bytes: u64) -> Result<Bytes, FetchError> {
            let body = self
                .bodies
                .get(url)
                .cloned()
                .ok_or(FetchError::Status { status: 404 })?;
            let size = body.len() as u64;
            if size > max_bytes {
                return Err(FetchError::TooLarge {
                    size,
                    limit: max_bytes,
                });
            }
            if body.is_empty() {
                return Err(FetchError::Empty);
            }
            Ok(body)
        }
    }
}

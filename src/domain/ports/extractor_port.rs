//! Port for turning a source link into directly fetchable media.

use async_trait::async_trait;

use crate::domain::entities::RemoteAsset;
use crate::domain::errors::ExtractError;

/// Resolves social-media links into remote asset URLs.
#[async_trait]
pub trait Extractor: Send + Sync + std::fmt::Display {
    /// Returns true if the URL has a shape this extractor claims.
    fn is_supported(&self, url: &str) -> bool;

    /// Resolves the URL into one asset, or several for multi-asset posts.
    async fn extract(&self, url: &str) -> Result<Vec<RemoteAsset>, ExtractError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Extractor double that counts calls and returns a canned result.
    pub struct MockExtractor {
        name: &'static str,
        prefix: &'static str,
        assets: Option<Vec<String>>,
        calls: Arc<AtomicUsize>,
    }

    impl MockExtractor {
        /// Supports URLs starting with `prefix` and returns `assets`.
        pub fn returning(name: &'static str, prefix: &'static str, assets: &[&str]) -> Self {
            Self {
                name,
                prefix,
                assets: Some(assets.iter().map(|s| (*s).to_string()).collect()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Supports URLs starting with `prefix` and always fails.
        pub fn failing(name: &'static str, prefix: &'static str) -> Self {
            Self {
                name,
                prefix,
                assets: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Shared call counter.
        pub fn calls(&self) -> Arc<AtomicUsize> {
            self.calls.clone()
        }
    }

    impl std::fmt::Display for MockExtractor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "mock extractor {}", self.name)
        }
    }

    #[async_trait]
    impl Extractor for MockExtractor {
        fn is_supported(&self, url: &str) -> bool {
            url.starts_with(self.prefix)
        }

        async fn extract(&self, _url: &str) -> Result<Vec<RemoteAsset>, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            match &self.assets {
                Some(assets) => Ok(assets.iter().cloned().map(RemoteAsset::from).collect()),
                None => Err(ExtractError::service(self.name, "mock failure")),
            }
        }
    }
}

//! Destination adapters and their scheme registry.

mod b2;
mod file_server;
mod filesystem;
mod webdav;

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use reqwest::Client;
use url::Url;

pub use b2::{B2Config, B2Destination};
pub use file_server::{FileServer, file_router};
pub use filesystem::FsDestination;
pub use webdav::WebDavDestination;

use crate::domain::errors::DestinationError;
use crate::domain::ports::Destination;

/// Shared resources handed to destination constructors.
#[derive(Clone)]
pub struct DestinationContext {
    /// HTTP client for network-backed destinations.
    pub client: Client,
    /// Largest object a destination will read back.
    pub max_media_size: u64,
}

/// Builds a destination from its configuration URL.
pub type DestinationConstructor = fn(
    Url,
    DestinationContext,
) -> BoxFuture<'static, Result<Arc<dyn Destination>, DestinationError>>;

/// Maps configuration URL schemes to destination constructors.
pub struct DestinationRegistry {
    constructors: HashMap<&'static str, DestinationConstructor>,
}

impl Default for DestinationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DestinationRegistry {
    /// Creates a registry with every built-in destination.
    #[must_use]
    pub fn new() -> Self {
        let mut constructors: HashMap<&'static str, DestinationConstructor> = HashMap::new();
        constructors.insert("b2", |url, ctx| {
            Box::pin(async move {
                let destination = B2Destination::from_config(&url, ctx.max_media_size).await?;
                Ok(Arc::new(destination) as Arc<dyn Destination>)
            })
        });
        constructors.insert("fs", |url, _ctx| {
            Box::pin(async move {
                let destination = FsDestination::from_config(&url).await?;
                Ok(Arc::new(destination) as Arc<dyn Destination>)
            })
        });
        constructors.insert("rclone+webdav", |url, ctx| {
            Box::pin(async move {
                let destination = WebDavDestination::from_config(&url, ctx.client, ctx.max_media_size)?;
                Ok(Arc::new(destination) as Arc<dyn Destination>)
            })
        });
        Self { constructors }
    }

    /// Returns the registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&'static str> {
        let mut schemes: Vec<_> = self.constructors.keys().copied().collect();
        schemes.sort_unstable();
        schemes
    }

    /// Builds the destination named by a configuration URL.
    ///
    /// # Errors
    /// Returns `DestinationError::Config` for unparsable URLs or unknown
    /// schemes, or whatever the constructor reports.
    pub async fn build(
        &self,
        config: &str,
        context: DestinationContext,
    ) -> Result<Arc<dyn Destination>, DestinationError> {
        let url = Url::parse(config.trim())
            .map_err(|e| DestinationError::config(format!("invalid destination url: {e}")))?;
        let constructor = self.constructors.get(url.scheme()).ok_or_else(|| {
            DestinationError::config(format!(
                "unknown destination scheme {:?}, expected one of {:?}",
                url.scheme(),
                self.schemes()
            ))
        })?;
        constructor(url, context).await
    }
}

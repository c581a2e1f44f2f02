//! Destination talking to an rclone WebDAV gateway over plain HTTP.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::domain::errors::{DestinationError, validate_object_name};
use crate::domain::ports::Destination;

/// Objects behind `http://<host>[/path]/<name>`.
///
/// Configured as `rclone+webdav://<host>[:port][/path]`.
pub struct WebDavDestination {
    client: Client,
    base_url: String,
    max_object_size: u64,
}

impl WebDavDestination {
    /// Creates a destination rooted at an HTTP base URL.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>, max_object_size: u64) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            max_object_size,
        }
    }

    /// Creates a destination from its configuration URL.
    ///
    /// # Errors
    /// Returns `DestinationError::Config` if the URL has no host.
    pub fn from_config(
        config: &Url,
        client: Client,
        max_object_size: u64,
    ) -> Result<Self, DestinationError> {
        let host = config
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DestinationError::config(format!("{config} has no host")))?;
        let port = config.port().map(|p| format!(":{p}")).unwrap_or_default();
        let base_url = format!("http://{host}{port}{}", config.path());
        Ok(Self::new(client, base_url, max_object_size))
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/{name}", self.base_url.trim_end_matches('/'))
    }
}

impl std::fmt::Display for WebDavDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rclone+webdav: {:?}", self.base_url)
    }
}

#[async_trait]
impl Destination for WebDavDestination {
    async fn upload(&self, name: &str, content: Bytes) -> Result<(), DestinationError> {
        validate_object_name(name)?;

        let response = self
            .client
            .put(self.object_url(name))
            .body(content)
            .send()
            .await
            .map_err(|e| DestinationError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DestinationError::UnexpectedStatus {
                status: status.as_u16(),
                name: name.to_string(),
            });
        }

        debug!(name, "Uploaded to WebDAV");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Bytes, DestinationError> {
        validate_object_name(name)?;

        let mut response = self
            .client
            .get(self.object_url(name))
            .send()
            .await
            .map_err(|e| DestinationError::network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(DestinationError::not_found(name));
        }
        if !status.is_success() {
            return Err(DestinationError::UnexpectedStatus {
                status: status.as_u16(),
                name: name.to_string(),
            });
        }

        let too_large = |size: u64| DestinationError::TooLarge {
            name: name.to_string(),
            size,
            limit: self.max_object_size,
        };
        if let Some(size) = response.content_length()
            && size > self.max_object_size
        {
            return Err(too_large(size));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DestinationError::network(e.to_string()))?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > self.max_object_size {
                return Err(too_large(size));
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            return Err(DestinationError::storage(format!("{name} is empty")));
        }
        Ok(body.freeze())
    }
}

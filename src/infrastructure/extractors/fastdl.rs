//! Extractor backed by a fastdl video proxy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use super::{JsonReply, UrlPatterns, endpoint_url, post_json};
use crate::domain::entities::RemoteAsset;
use crate::domain::errors::ExtractError;
use crate::domain::ports::Extractor;

const NAME: &str = "fastdl";

const SUPPORTED: &[&str] = &[
    "instagram.com/reel/*",
    "instagram.com/p/*",
    "instagram.com/story/*",
];

#[derive(Debug, Serialize)]
struct ProxyRequest<'a> {
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    #[serde(default)]
    remote_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ProxyError {
    msg: String,
}

/// Resolves Instagram links through a fastdl proxy.
///
/// Configured as `fastdl://host[:port][/path]`; always spoken to over plain HTTP.
pub struct FastDlExtractor {
    client: Client,
    endpoint: String,
    patterns: UrlPatterns,
}

impl FastDlExtractor {
    /// Creates an extractor for an HTTP endpoint.
    ///
    /// # Errors
    /// Returns error if the support patterns fail to compile.
    pub fn new(client: Client, endpoint: impl Into<String>) -> Result<Self, ExtractError> {
        let patterns =
            UrlPatterns::new(SUPPORTED).map_err(|e| ExtractError::config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            patterns,
        })
    }

    /// Creates an extractor from its configuration URL.
    ///
    /// # Errors
    /// Returns `ExtractError::Config` if the URL has no host.
    pub fn from_config(config: &Url, client: Client) -> Result<Self, ExtractError> {
        let endpoint = endpoint_url(config, false).map_err(ExtractError::config)?;
        Self::new(client, endpoint)
    }
}

impl std::fmt::Display for FastDlExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fastdl at {}", self.endpoint)
    }
}

#[async_trait]
impl Extractor for FastDlExtractor {
    fn is_supported(&self, url: &str) -> bool {
        self.patterns.matches(url)
    }

    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<Vec<RemoteAsset>, ExtractError> {
        let reply = post_json::<_, ProxyResponse, ProxyError>(
            &self.client,
            NAME,
            &self.endpoint,
            &ProxyRequest { target: url },
            None,
        )
        .await?;

        match reply {
            JsonReply::Ok(response) => Ok(response
                .remote_urls
                .into_iter()
                .map(RemoteAsset::from)
                .collect()),
            JsonReply::Err { body, .. } => Err(ExtractError::service(NAME, body.msg)),
        }
    }
}

//! Extractor backed by a cobalt media resolver instance.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use super::{JsonReply, UrlPatterns, endpoint_url, post_json};
use crate::domain::entities::RemoteAsset;
use crate::domain::errors::ExtractError;
use crate::domain::ports::Extractor;

const NAME: &str = "cobalt";

const SUPPORTED: &[&str] = &[
    "instagram.com/reel/*",
    "tiktok.com/t/*",
    "tiktok.com/@*/video/*",
    "vm.tiktok.com/*",
    "twitter.com/*/status/*",
    "t.co/*",
    "x.com/*/status/*",
    "bsky.app/profile/*/post/*",
    "twitch.tv/*/clip/*",
    "youtube.com/shorts/*",
    "reddit.com/r/*/comments/*",
    "old.reddit.com/r/*/comments/*",
    "redd.it/*",
    "v.redd.it/*",
];

#[derive(Debug, Serialize)]
struct CobaltRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CobaltResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    picker: Vec<CobaltPickerItem>,
    #[serde(default)]
    error: Option<CobaltErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CobaltPickerItem {
    url: String,
}

#[derive(Debug, Deserialize)]
struct CobaltErrorBody {
    #[serde(default)]
    error: Option<CobaltErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct CobaltErrorDetail {
    code: String,
}

/// Resolves links through the cobalt API.
///
/// Configured as `cobalt://host[:port][/path]?key=<api key>&insecure=1`.
pub struct CobaltExtractor {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    patterns: UrlPatterns,
}

impl CobaltExtractor {
    /// Creates an extractor for an HTTP endpoint.
    ///
    /// # Errors
    /// Returns error if the support patterns fail to compile.
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, ExtractError> {
        let patterns =
            UrlPatterns::new(SUPPORTED).map_err(|e| ExtractError::config(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            patterns,
        })
    }

    /// Creates an extractor from its configuration URL.
    ///
    /// # Errors
    /// Returns `ExtractError::Config` if the URL has no host.
    pub fn from_config(config: &Url, client: Client) -> Result<Self, ExtractError> {
        let insecure = config.query_pairs().any(|(key, _)| key == "insecure");
        let api_key = config
            .query_pairs()
            .find(|(key, _)| key == "key")
            .map(|(_, value)| value.into_owned());
        let endpoint = endpoint_url(config, !insecure).map_err(ExtractError::config)?;
        Self::new(client, endpoint, api_key)
    }
}

impl std::fmt::Display for CobaltExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cobalt at {}", self.endpoint)
    }
}

#[async_trait]
impl Extractor for CobaltExtractor {
    fn is_supported(&self, url: &str) -> bool {
        self.patterns.matches(url)
    }

    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<Vec<RemoteAsset>, ExtractError> {
        let reply = post_json::<_, CobaltResponse, CobaltErrorBody>(
            &self.client,
            NAME,
            &self.endpoint,
            &CobaltRequest { url },
            self.api_key.as_deref(),
        )
        .await?;

        let response = match reply {
            JsonReply::Ok(response) => response,
            JsonReply::Err { status, body } => {
                let code = body
                    .error
                    .map_or_else(|| format!("HTTP {status}"), |detail| detail.code);
                return Err(ExtractError::service(NAME, code));
            }
        };

        debug!(status = %response.status, "Cobalt responded");

        match response.status.as_str() {
            "redirect" | "tunnel" => response
                .url
                .map(|u| vec![RemoteAsset::new(u)])
                .ok_or_else(|| ExtractError::unexpected(NAME, "response is missing url")),
            "picker" => Ok(response
                .picker
                .into_iter()
                .map(|item| RemoteAsset::new(item.url))
                .collect()),
            "error" => Err(ExtractError::service(
                NAME,
                response
                    .error
                    .map_or_else(|| "unknown error".to_string(), |detail| detail.code),
            )),
            other => Err(ExtractError::unexpected(
                NAME,
                format!("unexpected response type: {other}"),
            )),
        }
    }
}

//! Extractor adapters and their scheme registry.

mod cobalt;
mod fastdl;
mod url_pattern;

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

pub use cobalt::CobaltExtractor;
pub use fastdl::FastDlExtractor;
pub use url_pattern::UrlPatterns;

use crate::domain::errors::ExtractError;
use crate::domain::ports::Extractor;

/// Builds an extractor from its configuration URL.
pub type ExtractorConstructor = fn(&Url, Client) -> Result<Arc<dyn Extractor>, ExtractError>;

/// Maps configuration URL schemes to extractor constructors.
pub struct ExtractorRegistry {
    constructors: HashMap<&'static str, ExtractorConstructor>,
    client: Client,
}

impl ExtractorRegistry {
    /// Creates a registry with every built-in extractor.
    #[must_use]
    pub fn new(client: Client) -> Self {
        let mut constructors: HashMap<&'static str, ExtractorConstructor> = HashMap::new();
        constructors.insert("cobalt", |url, client| {
            Ok(Arc::new(CobaltExtractor::from_config(url, client)?))
        });
        constructors.insert("fastdl", |url, client| {
            Ok(Arc::new(FastDlExtractor::from_config(url, client)?))
        });
        Self {
            constructors,
            client,
        }
    }

    /// Returns the registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&'static str> {
        let mut schemes: Vec<_> = self.constructors.keys().copied().collect();
        schemes.sort_unstable();
        schemes
    }

    /// Builds one extractor from a configuration URL.
    ///
    /// # Errors
    /// Returns `ExtractError::Config` for unparsable URLs or unknown schemes.
    pub fn build(&self, config: &str) -> Result<Arc<dyn Extractor>, ExtractError> {
        let url = Url::parse(config.trim())
            .map_err(|e| ExtractError::config(format!("invalid extractor url {config:?}: {e}")))?;
        let constructor = self.constructors.get(url.scheme()).ok_or_else(|| {
            ExtractError::config(format!(
                "unknown extractor scheme {:?}, expected one of {:?}",
                url.scheme(),
                self.schemes()
            ))
        })?;
        constructor(&url, self.client.clone())
    }

    /// Builds an ordered extractor chain from a comma-separated list.
    ///
    /// # Errors
    /// Returns the first construction error.
    pub fn build_all(&self, configs: &str) -> Result<Vec<Arc<dyn Extractor>>, ExtractError> {
        configs
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(|c| self.build(c))
            .collect()
    }
}

/// Rebuilds a configuration URL as an HTTP endpoint without its query.
pub(crate) fn endpoint_url(config: &Url, secure: bool) -> Result<String, String> {
    let host = config
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| format!("{config} has no host"))?;
    let scheme = if secure { "https" } else { "http" };
    let port = config.port().map(|p| format!(":{p}")).unwrap_or_default();
    Ok(format!("{scheme}://{host}{port}{}", config.path()))
}

/// Outcome of a JSON POST whose error bodies have their own shape.
pub(crate) enum JsonReply<V, E> {
    Ok(V),
    Err { status: u16, body: E },
}

/// POSTs a JSON body and decodes the success or error payload.
pub(crate) async fn post_json<B, V, E>(
    client: &Client,
    extractor: &str,
    endpoint: &str,
    body: &B,
    api_key: Option<&str>,
) -> Result<JsonReply<V, E>, ExtractError>
where
    B: Serialize + ?Sized,
    V: DeserializeOwned,
    E: DeserializeOwned,
{
    let mut request = client
        .post(endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(body);
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        request = request.header(reqwest::header::AUTHORIZATION, format!("Api-Key {key}"));
    }

    let response = request
        .send()
        .await
        .map_err(|e| ExtractError::network(extractor, e.to_string()))?;
    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::network(extractor, format!("reading response body: {e}")))?;

    if status.is_success() {
        serde_json::from_slice(&bytes)
            .map(JsonReply::Ok)
            .map_err(|e| ExtractError::unexpected(extractor, format!("parsing response: {status}: {e}")))
    } else {
        serde_json::from_slice(&bytes)
            .map(|body| JsonReply::Err {
                status: status.as_u16(),
                body,
            })
            .map_err(|e| {
                ExtractError::unexpected(extractor, format!("parsing error body: {status}: {e}"))
            })
    }
}

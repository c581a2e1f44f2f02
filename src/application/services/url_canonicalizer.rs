//! Source URL canonicalization.

use std::collections::{HashMap, HashSet};

use url::Url;

use crate::domain::entities::MediaReference;
use crate::domain::errors::ReuploadError;

/// Reduces source URLs to a stable key by dropping query noise.
///
/// Only parameters on a host's allow-list survive, sorted by key. The
/// fragment is always removed.
#[derive(Debug, Clone)]
pub struct UrlCanonicalizer {
    allowed_params: HashMap<String, HashSet<String>>,
}

impl Default for UrlCanonicalizer {
    fn default() -> Self {
        Self::empty()
            .with_allowed_params("youtube.com", ["v", "t"])
            .with_allowed_params("www.youtube.com", ["v", "t"])
    }
}

impl UrlCanonicalizer {
    /// Creates a canonicalizer that drops every query parameter.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allowed_params: HashMap::new(),
        }
    }

    /// Allows the given parameters to survive for a host.
    #[must_use]
    pub fn with_allowed_params<I, S>(mut self, host: &str, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_params
            .entry(host.to_ascii_lowercase())
            .or_default()
            .extend(params.into_iter().map(Into::into));
        self
    }

    /// Canonicalizes a raw URL.
    ///
    /// # Errors
    /// Returns `ReuploadError::Canonicalization` if the URL cannot be parsed.
    pub fn canonicalize(&self, raw: &str) -> Result<String, ReuploadError> {
        let mut url = Url::parse(raw.trim()).map_err(|e| ReuploadError::Canonicalization {
            url: raw.to_string(),
            message: e.to_string(),
        })?;

        let allowed = url.host_str().and_then(|host| self.allowed_params.get(host));

        let mut kept: Vec<(String, String)> = match allowed {
            Some(allowed) => url
                .query_pairs()
                .filter(|(key, _)| allowed.contains(key.as_ref()))
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .collect(),
            None => Vec::new(),
        };
        // Stable sort keeps repeated keys in their original order.
        kept.sort_by(|a, b| a.0.cmp(&b.0));

        if kept.is_empty() {
            url.set_query(None);
        } else {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(kept)
                .finish();
            url.set_query(Some(&query));
        }
        url.set_fragment(None);

        Ok(url.into())
    }

    /// Canonicalizes a URL and computes its fingerprint.
    ///
    /// # Errors
    /// Returns `ReuploadError::Canonicalization` if the URL cannot be parsed.
    pub fn reference(&self, raw: &str) -> Result<MediaReference, ReuploadError> {
        let canonical = self.canonicalize(raw)?;
        Ok(MediaReference::new(raw, canonical))
    }
}

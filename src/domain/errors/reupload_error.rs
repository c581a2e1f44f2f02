//! Reupload pipeline error types.

use thiserror::Error;

use super::{DestinationError, ExtractError, FetchError};

/// Why a fetched asset was refused before storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum RejectReason {
    #[error("payload too large: {size} bytes exceeds limit of {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("content type {detected} is not allowed")]
    UnsupportedContentType { detected: String },

    #[error("response body is empty")]
    EmptyBody,
}

/// Reupload error variants.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum ReuploadError {
    #[error("invalid source url {url:?}: {message}")]
    Canonicalization { url: String, message: String },

    #[error("no extractor supports {url}")]
    NoExtractorMatched { url: String },

    #[error("extracting media from {url}: {}", join_causes(.causes))]
    ExtractionFailed {
        url: String,
        causes: Vec<ExtractError>,
    },

    #[error("asset {url} rejected: {reason}")]
    TransferRejected { url: String, reason: RejectReason },

    #[error("fetching asset {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("manifest {name} is corrupt: {message}")]
    ManifestCorrupt { name: String, message: String },

    #[error("destination error: {0}")]
    Destination(#[from] DestinationError),

    #[error("none of the {attempted} assets extracted from {url} could be stored")]
    NoAssetsStored { url: String, attempted: usize },
}

impl ReuploadError {
    /// Classifies a fetch failure: size and emptiness are rejections, the rest are fetch errors.
    #[must_use]
    pub fn from_fetch(url: impl Into<String>, error: FetchError) -> Self {
        let url = url.into();
        match error {
            FetchError::TooLarge { size, limit } => Self::TransferRejected {
                url,
                reason: RejectReason::TooLarge { size, limit },
            },
            FetchError::Empty => Self::TransferRejected {
                url,
                reason: RejectReason::EmptyBody,
            },
            source => Self::Fetch { url, source },
        }
    }

    /// Returns whether the error concerns a single asset rather than the whole request.
    #[must_use]
    pub const fn is_asset_error(&self) -> bool {
        matches!(
            self,
            Self::TransferRejected { .. } | Self::Fetch { .. } | Self::Destination(_)
        )
    }
}

fn join_causes(causes: &[ExtractError]) -> String {
    causes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

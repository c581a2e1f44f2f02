use bytes::Bytes;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 12;

/// Short content-address of a canonical source URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes a canonical URL into its fingerprint.
    #[must_use]
    pub fn of(canonical_url: &str) -> Self {
        let digest = Sha256::digest(canonical_url.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(FINGERPRINT_LEN);
        Self(hex)
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the manifest object for this fingerprint.
    #[must_use]
    pub fn manifest_name(&self) -> String {
        format!("{}.json", self.0)
    }

    /// Base object name (without extension) for an asset.
    ///
    /// `index` is zero-based; multi-asset names carry the 1-based position.
    #[must_use]
    pub fn asset_stem(&self, index: usize, total: usize) -> String {
        if total == 1 {
            self.0.clone()
        } else {
            format!("{}-{}", self.0, index + 1)
        }
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A source link after canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    source_url: String,
    canonical_url: String,
    fingerprint: Fingerprint,
}

#[allow(missing_docs)]
impl MediaReference {
    /// Builds a reference from an already canonical URL.
    #[must_use]
    pub fn new(source_url: impl Into<String>, canonical_url: impl Into<String>) -> Self {
        let canonical_url = canonical_url.into();
        let fingerprint = Fingerprint::of(&canonical_url);
        Self {
            source_url: source_url.into(),
            canonical_url,
            fingerprint,
        }
    }

    #[must_use]
    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    #[must_use]
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    #[must_use]
    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// Directly fetchable media URL produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAsset {
    url: String,
}

#[allow(missing_docs)]
impl RemoteAsset {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl From<String> for RemoteAsset {
    fn from(url: String) -> Self {
        Self { url }
    }
}

/// Media types accepted for storage, identified from content bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// MPEG-4 video.
    Mp4,
    /// JPEG image.
    Jpeg,
    /// PNG image.
    Png,
    /// GIF image.
    Gif,
}

impl MediaKind {
    /// Every accepted kind.
    pub const ALL: [Self; 4] = [Self::Mp4, Self::Jpeg, Self::Png, Self::Gif];

    /// Returns the MIME type.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
        }
    }

    /// Returns the file extension including the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => ".mp4",
            Self::Jpeg => ".jpeg",
            Self::Png => ".png",
            Self::Gif => ".gif",
        }
    }

    /// Looks up a kind by MIME type.
    #[must_use]
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.mime_type() == mime)
    }

    /// Looks up a kind by file extension, with or without the dot.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp4" => Some(Self::Mp4),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Validated asset ready to be written to a destination.
#[derive(Debug, Clone)]
pub struct StoredFile {
    name: String,
    kind: MediaKind,
    bytes: Bytes,
}

#[allow(missing_docs)]
impl StoredFile {
    /// Names the file `<stem><ext>` from its verified kind.
    #[must_use]
    pub fn new(stem: &str, kind: MediaKind, bytes: Bytes) -> Self {
        Self {
            name: format!("{stem}{}", kind.extension()),
            kind,
            bytes,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.bytes
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record of the files stored for one fingerprint.
///
/// Its presence in a destination means the source has already been reuploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// When the reupload finished.
    pub created_at: DateTime<Utc>,
    /// Canonical source URL.
    pub source_url: String,
    /// Stored object names, in extraction order.
    pub files: Vec<String>,
}

impl Manifest {
    /// Creates a manifest stamped with the current time.
    #[must_use]
    pub fn new(source_url: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            created_at: Utc::now(),
            source_url: source_url.into(),
            files,
        }
    }

    /// Serializes to pretty-printed JSON.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Parses a manifest from JSON bytes.
    ///
    /// # Errors
    /// Returns error if the bytes are not a valid manifest.
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_wire_format() {
        let manifest = Manifest {
            created_at: "2025-01-02T03:04:05Z".parse().unwrap(),
            source_url: "https://x.com/a/status/1".to_string(),
            files: vec!["abc.mp4".to_string()],
        };

        let json = String::from_utf8(manifest.to_json().unwrap()).unwrap();
        assert!(json.contains("\"created_at\": \"2025-01-02T03:04:05Z\""));
        assert!(json.contains("\"source_url\": \"https://x.com/a/status/1\""));
        assert!(json.contains('\n'));

        let parsed = Manifest::from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_manifest_rejects_garbage() {
        assert!(Manifest::from_json(b"{not json").is_err());
        assert!(Manifest::from_json(br#"{"files": []}"#).is_err());
    }
}

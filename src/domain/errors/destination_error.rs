//! Storage destination error types.

use thiserror::Error;

/// Destination error variants.
#[derive(Debug, Error)]
#[allow(missing_docs)]
pub enum DestinationError {
    /// The object does not exist. Callers treat this as a cache miss.
    #[error("object not found: {name}")]
    NotFound { name: String },

    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("storage error: {message}")]
    Storage { message: String },

    #[error("network error talking to destination: {message}")]
    Network { message: String },

    #[error("unexpected response status {status} for {name}")]
    UnexpectedStatus { status: u16, name: String },

    #[error("object {name} is too large: {size} bytes exceeds {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("invalid destination configuration: {message}")]
    Config { message: String },
}

impl DestinationError {
    /// Creates not found error.
    #[must_use]
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Creates invalid name error.
    #[must_use]
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Creates storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns whether this is the distinguished missing-object signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Rejects object names that could escape the storage root.
///
/// # Errors
/// Returns `InvalidName` for empty names, path separators, or dot segments.
pub fn validate_object_name(name: &str) -> Result<(), DestinationError> {
    if name.is_empty() {
        return Err(DestinationError::invalid_name(name, "must not be empty"));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DestinationError::invalid_name(
            name,
            "must not contain path separators",
        ));
    }
    if name == "." || name == ".." {
        return Err(DestinationError::invalid_name(name, "must not be a dot segment"));
    }
    if name.contains('\0') {
        return Err(DestinationError::invalid_name(name, "must not contain NUL"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("abc123.mp4" ; "plain")]
    #[test_case("abc123-2.jpeg" ; "indexed")]
    #[test_case("abc123.json" ; "manifest")]
    fn test_valid_names(name: &str) {
        assert!(validate_object_name(name).is_ok());
    }

    #[test_case("" ; "empty")]
    #[test_case("../etc/passwd" ; "traversal")]
    #[test_case("a/b.mp4" ; "slash")]
    #[test_case("a\\b.mp4" ; "backslash")]
    #[test_case(".." ; "dotdot")]
    #[test_case("." ; "dot")]
    fn test_invalid_names(name: &str) {
        let err = validate_object_name(name).unwrap_err();
        assert!(matches!(err, DestinationError::InvalidName { .. }));
    }

    #[test]
    fn test_not_found_is_distinguished() {
        assert!(DestinationError::not_found("x.json").is_not_found());
        assert!(!DestinationError::storage("disk full").is_not_found());
    }
}

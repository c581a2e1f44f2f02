//! Content type detection from leading bytes.

use crate::domain::entities::MediaKind;
use crate::domain::errors::RejectReason;

/// Label used when the bytes match no known signature.
pub const UNKNOWN_CONTENT_TYPE: &str = "application/octet-stream";

/// Identifies the media kind of a payload from its magic bytes.
///
/// Declared `Content-Type` headers and remote file names are never consulted.
///
/// # Errors
/// Returns `RejectReason::EmptyBody` for empty input and
/// `RejectReason::UnsupportedContentType` for anything outside the allow-list.
pub fn sniff_media_kind(bytes: &[u8]) -> Result<MediaKind, RejectReason> {
    if bytes.is_empty() {
        return Err(RejectReason::EmptyBody);
    }

    let detected = infer::get(bytes).map_or(UNKNOWN_CONTENT_TYPE, |t| t.mime_type());

    MediaKind::from_mime_type(detected).ok_or_else(|| RejectReason::UnsupportedContentType {
        detected: detected.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod samples {
    //! Minimal payloads carrying real magic numbers.

    pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR\x00\x00\x00\x01";
    pub const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00\x01\x01\x00";
    pub const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x80\x00\x00";
    pub const MP4: &[u8] = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00isomiso2";
    pub const HTML: &[u8] = b"<!DOCTYPE html><html><body>nope</body></html>";
}

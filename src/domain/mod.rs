//! Domain layer with core business entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{Fingerprint, Manifest, MediaReference, Message};
pub use errors::{DestinationError, ExtractError, ReuploadError};
pub use ports::{AssetFetcher, ChatPort, Destination, Extractor};

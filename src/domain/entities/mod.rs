//! Domain entity definitions.

mod manifest;
mod media;
mod message;

pub use manifest::Manifest;
pub use media::{FINGERPRINT_LEN, Fingerprint, MediaKind, MediaReference, RemoteAsset, StoredFile};
pub use message::{ChannelId, Embed, Message, MessageId};

//! Stateless and shared-state helpers used by the use cases.

pub mod channel_activity;
pub mod content_sniffer;
pub mod embed_formatter;
pub mod embed_waiter;
pub mod link_detector;
pub mod url_canonicalizer;

pub use channel_activity::ChannelActivity;
pub use content_sniffer::sniff_media_kind;
pub use embed_formatter::format_embed;
pub use embed_waiter::{DEFAULT_EMBED_DEADLINE, EmbedWait, EmbedWaiter};
pub use link_detector::LinkDetector;
pub use url_canonicalizer::UrlCanonicalizer;

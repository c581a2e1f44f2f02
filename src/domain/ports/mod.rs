mod chat_port;
mod destination_port;
mod extractor_port;
mod fetcher_port;

pub use chat_port::{ChatPort, ReplyContent};
pub use destination_port::Destination;
pub use extractor_port::Extractor;
pub use fetcher_port::AssetFetcher;

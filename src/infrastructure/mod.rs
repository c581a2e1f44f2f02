//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Storage backends for reuploaded media.
pub mod destinations;
/// Discord gateway and REST adapters.
pub mod discord;
/// Media resolver services.
pub mod extractors;
pub mod fetch;
pub mod http;

pub use config::{AppConfig, CliArgs, ConfigError, LogLevel, RelaySettings, StorageManager};
pub use destinations::{DestinationContext, DestinationRegistry};
pub use discord::{
    DiscordClient, DispatchEvent, GatewayClient, GatewayClientConfig, GatewayEventKind,
};
pub use extractors::ExtractorRegistry;
pub use fetch::HttpAssetFetcher;

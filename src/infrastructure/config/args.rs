use super::app_config::LogLevel;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Default, Parser)]
#[command(
    name = "preview-relay",
    version,
    about = "Chat bot that reuploads linked social media to stable storage and replies with playable permalinks",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Discord bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Destination URL, e.g. `fs:///srv/media?server=:8080` or `b2://key:secret@bucket`.
    #[arg(long, env = "PREVIEW_DESTINATION", value_name = "URL")]
    pub destination: Option<String>,

    /// Comma-separated extractor URLs, tried in order.
    #[arg(long, env = "PREVIEW_EXTRACTORS", value_name = "URLS")]
    pub extractors: Option<String>,

    /// Public base URL the destination is served from.
    #[arg(long, env = "PREVIEW_PUBLIC_URL", value_name = "URL")]
    pub public_url: Option<String>,

    /// Serve the diagnostic page on this address.
    #[arg(long, env = "PREVIEW_TEST_SERVER", value_name = "HOST:PORT")]
    pub test_server: Option<String>,

    /// Largest accepted media file, in bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_media_size: Option<u64>,

    /// How long to wait for the platform embed, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub embed_timeout_ms: Option<u64>,
}

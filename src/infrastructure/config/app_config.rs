//! Application configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::args::CliArgs;
use super::storage::ConfigError;
use crate::application::services::DEFAULT_EMBED_DEADLINE;
use crate::application::use_cases::DEFAULT_MAX_MEDIA_SIZE;

const APP_NAME: &str = "preview-relay";
const APP_QUALIFIER: &str = "dev";
const APP_ORGANIZATION: &str = "preview-relay";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Configuration as read from the TOML file and overridden by the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file path.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Log file path. Logs go to stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Discord bot token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Destination configuration URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Comma-separated extractor configuration URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractors: Option<String>,

    /// Public base URL of the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Diagnostic page listen address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_server: Option<String>,

    /// Largest accepted media file, in bytes.
    #[serde(default = "default_max_media_size")]
    pub max_media_size: u64,

    /// Embed wait deadline, in milliseconds.
    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,
}

/// Fully validated settings the runtime is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct RelaySettings {
    pub token: String,
    pub destination: String,
    pub extractors: String,
    pub public_url: String,
    pub test_server: Option<SocketAddr>,
    pub max_media_size: u64,
    pub embed_timeout: Duration,
}

const fn default_max_media_size() -> u64 {
    DEFAULT_MAX_MEDIA_SIZE
}

#[allow(clippy::cast_possible_truncation)]
const fn default_embed_timeout_ms() -> u64 {
    DEFAULT_EMBED_DEADLINE.as_millis() as u64
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing { field })
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: CliArgs) {
        if let Some(config_path) = args.config {
            self.config = Some(config_path);
        }
        if let Some(log_path) = args.log_path {
            self.log_path = Some(log_path);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(token) = args.token {
            self.token = Some(token);
        }
        if let Some(destination) = args.destination {
            self.destination = Some(destination);
        }
        if let Some(extractors) = args.extractors {
            self.extractors = Some(extractors);
        }
        if let Some(public_url) = args.public_url {
            self.public_url = Some(public_url);
        }
        if let Some(test_server) = args.test_server {
            self.test_server = Some(test_server);
        }
        if let Some(max_media_size) = args.max_media_size {
            self.max_media_size = max_media_size;
        }
        if let Some(embed_timeout_ms) = args.embed_timeout_ms {
            self.embed_timeout_ms = embed_timeout_ms;
        }
    }

    /// Checks that every required setting is present and well formed.
    ///
    /// # Errors
    /// Returns `ConfigError::Missing` for absent settings and
    /// `ConfigError::Invalid` for malformed ones.
    pub fn validate(&self) -> Result<RelaySettings, ConfigError> {
        let token = required(self.token.as_ref(), "token")?;
        let destination = required(self.destination.as_ref(), "destination")?;
        let extractors = required(self.extractors.as_ref(), "extractors")?;
        let public_url = required(self.public_url.as_ref(), "public_url")?;

        url::Url::parse(&public_url).map_err(|e| ConfigError::invalid("public_url", e))?;

        let test_server = self
            .test_server
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .map_err(|e| ConfigError::invalid("test_server", e))
            })
            .transpose()?;

        if self.max_media_size == 0 {
            return Err(ConfigError::invalid("max_media_size", "must be positive"));
        }

        Ok(RelaySettings {
            token,
            destination,
            extractors,
            public_url,
            test_server,
            max_media_size: self.max_media_size,
            embed_timeout: Duration::from_millis(self.embed_timeout_ms),
        })
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns effective config path.
    #[must_use]
    pub fn effective_config_path(&self) -> Option<PathBuf> {
        self.config.clone().or_else(Self::default_config_path)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            log_path: None,
            log_level: LogLevel::Info,
            token: None,
            destination: None,
            extractors: None,
            public_url: None,
            test_server: None,
            max_media_size: DEFAULT_MAX_MEDIA_SIZE,
            embed_timeout_ms: default_embed_timeout_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> AppConfig {
        AppConfig {
            token: Some("tok".into()),
            destination: Some("fs:///tmp/media".into()),
            extractors: Some("cobalt://cobalt.example".into()),
            public_url: Some("https://media.example/".into()),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_parse_config_file() {
        let toml_content = r#"
            log_level = "debug"
            destination = "rclone+webdav://rclone:8080/media"
            extractors = "cobalt://cobalt:9000?insecure, fastdl://fastdl:8000"
            public_url = "https://media.example"
            max_media_size = 1048576
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.max_media_size, 1_048_576);
        assert_eq!(config.embed_timeout_ms, 3000);
        assert!(config.token.is_none());
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_media_size, DEFAULT_MAX_MEDIA_SIZE);
        assert_eq!(config.embed_timeout_ms, 3000);
        assert_eq!(config.log_level.to_string(), "info");
    }

    #[test]
    fn test_args_override_file() {
        let mut config = complete();
        config.merge_with_args(CliArgs {
            destination: Some("b2://id:key@bucket".into()),
            embed_timeout_ms: Some(500),
            ..CliArgs::default()
        });

        assert_eq!(config.destination.as_deref(), Some("b2://id:key@bucket"));
        assert_eq!(config.embed_timeout_ms, 500);
        assert_eq!(config.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_validate_complete() {
        let settings = complete().validate().unwrap();
        assert_eq!(settings.token, "tok");
        assert_eq!(settings.embed_timeout, Duration::from_secs(3));
        assert!(settings.test_server.is_none());
    }

    #[test]
    fn test_validate_reports_missing_field() {
        let mut config = complete();
        config.public_url = Some("   ".into());

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing {
                field: "public_url"
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_listen_address() {
        let mut config = complete();
        config.test_server = Some("not an address".into());

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "test_server",
                ..
            })
        ));

        config.test_server = Some("127.0.0.1:8080".into());
        assert_eq!(
            config.validate().unwrap().test_server,
            Some("127.0.0.1:8080".parse().unwrap())
        );
    }
}

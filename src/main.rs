use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use preview_relay::application::{ChannelActivity, EmbedWaiter, Reuploader};
use preview_relay::infrastructure::http::{DEFAULT_TIMEOUT, build_client};
use preview_relay::infrastructure::{
    AppConfig, CliArgs, DestinationContext, DestinationRegistry, DiscordClient, ExtractorRegistry,
    GatewayClient, HttpAssetFetcher, StorageManager,
};
use preview_relay::presentation::{BotHandler, DiagnosticsServer};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .init();
    }

    Ok(())
}

fn load_config() -> Result<AppConfig> {
    let args = CliArgs::parse();
    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    let config = load_config()?;
    init_logging(&config)?;
    let settings = config.validate()?;

    info!(version = preview_relay::VERSION, "Starting {}", preview_relay::NAME);

    let client = build_client(DEFAULT_TIMEOUT)?;
    let extractors = ExtractorRegistry::new(client.clone()).build_all(&settings.extractors)?;
    info!(
        extractors = %extractors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
        "Extractors configured"
    );

    let destination = DestinationRegistry::new()
        .build(
            &settings.destination,
            DestinationContext {
                client,
                max_media_size: settings.max_media_size,
            },
        )
        .await?;

    let reuploader = Arc::new(
        Reuploader::new(
            Arc::clone(&destination),
            Arc::new(HttpAssetFetcher::new()?),
            settings.public_url.clone(),
        )
        .with_extractors(extractors)
        .with_max_media_size(settings.max_media_size),
    );

    let diagnostics = match settings.test_server {
        Some(addr) => Some(DiagnosticsServer::start(addr, Arc::clone(&reuploader)).await?),
        None => None,
    };

    let handler = BotHandler::new(
        Arc::clone(&reuploader),
        Arc::new(EmbedWaiter::new(settings.embed_timeout)),
        Arc::new(ChannelActivity::new()),
        Arc::new(DiscordClient::new(&settings.token)?),
    );

    let mut gateway = GatewayClient::with_default_config();
    let events = gateway.connect(&settings.token)?;
    let mut bot_task = tokio::spawn(handler.run(events));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown requested");
        }
        _ = &mut bot_task => warn!("Gateway event stream closed"),
    }

    gateway.disconnect();
    if let Some(server) = diagnostics {
        server.shutdown().await;
    }
    if let Err(e) = destination.close().await {
        warn!(error = %e, "Failed to close destination");
    }

    info!("Stopped");
    Ok(())
}

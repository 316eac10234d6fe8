mod config;
mod discord;
mod platform;
mod relay;
mod resolver;
mod transform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::discord::WebhookClient;
use crate::platform::telegram::{self, TelegramDirectory, TelegramMedia};
use crate::relay::Relay;
use crate::transform::Transformer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tgrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Channel: {}", config.telegram.channel);
    info!("  Media policy: {}", config.relay.media);

    let bot = Bot::new(&config.telegram.bot_token);
    let bot_name = telegram::authenticate(&bot).await?;
    info!("Authenticated as {}", bot_name);

    // Resolve the source channel before listening
    let directory = TelegramDirectory::new(bot.clone());
    let channel = resolver::resolve(&directory, &config.telegram.channel)
        .await
        .context("Error connecting to the channel")?;
    info!(
        "Successfully connected to channel: {}",
        channel.display_name()
    );

    let webhook = WebhookClient::new(&config.discord.webhook_url)?;
    let fetcher = TelegramMedia::new(bot.clone(), config.telegram.download_dir.clone());
    let relay = Arc::new(Relay::new(
        Transformer::new(config.relay.media),
        webhook,
        Arc::new(fetcher),
    ));

    info!("Bot is running. Press Ctrl+C to stop.");
    telegram::run(bot, channel, relay).await?;

    Ok(())
}

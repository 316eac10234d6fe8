use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Which Telegram media kinds get forwarded as webhook attachments.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaPolicy {
    /// Only photos are attached; everything else is relayed as text only.
    #[default]
    Photos,
    /// Every downloadable media kind is attached as a generic file.
    All,
}

impl std::fmt::Display for MediaPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaPolicy::Photos => write!(f, "photos"),
            MediaPolicy::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Channel username (with or without `@`) or numeric chat id.
    #[serde(default)]
    pub channel: String,
    /// Where downloaded media is staged before upload. Defaults to the system temp dir.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DiscordConfig {
    #[serde(default)]
    pub webhook_url: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub media: MediaPolicy,
}

pub const ENV_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_CHANNEL: &str = "TELEGRAM_CHANNEL";
pub const ENV_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";

impl Config {
    /// Load the config file (if present), apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            info!(
                "Config file {} not found, using environment only",
                path.display()
            );
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Replace file values with any non-empty value returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_BOT_TOKEN) {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get(ENV_CHANNEL) {
            self.telegram.channel = v;
        }
        if let Some(v) = get(ENV_WEBHOOK_URL) {
            self.discord.webhook_url = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("Missing telegram.bot_token (or {ENV_BOT_TOKEN})");
        }
        if self.telegram.channel.trim().is_empty() {
            anyhow::bail!("Missing telegram.channel (or {ENV_CHANNEL})");
        }
        if self.discord.webhook_url.trim().is_empty() {
            anyhow::bail!("Missing discord.webhook_url (or {ENV_WEBHOOK_URL})");
        }

        let url = reqwest::Url::parse(self.discord.webhook_url.trim())
            .with_context(|| format!("Invalid discord.webhook_url: {}", self.discord.webhook_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("discord.webhook_url must be an http(s) URL, got {}", url.scheme());
        }

        Ok(())
    }
}

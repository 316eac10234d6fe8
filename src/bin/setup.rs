//! tgrelay setup wizard.
//!
//! Prompts for the Telegram bot token, source channel, Discord webhook URL and
//! media policy, then writes `config.toml` to the project root (`TGRELAY_ROOT`
//! or the current directory).

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

// ── Config formatting ──────────────────────────────────────────────────────────

struct ConfigParams<'a> {
    bot_token: &'a str,
    channel: &'a str,
    webhook_url: &'a str,
    media: &'a str,
    download_dir: &'a str,
}

/// TOML string literal for `value`, escaped as needed.
fn quote(value: &str) -> String {
    toml::Value::String(value.to_owned()).to_string()
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let dir_line = if p.download_dir.is_empty() {
        "# download_dir = \"/var/tmp/tgrelay\"".to_owned()
    } else {
        format!("download_dir = {}", quote(p.download_dir))
    };

    let bot_token = quote(p.bot_token);
    let channel = quote(p.channel.trim());
    let webhook_url = quote(p.webhook_url);
    let media = quote(p.media);

    format!(
        r#"[telegram]
bot_token = {bot_token}
# Username (with or without @) or numeric chat id
channel = {channel}
{dir_line}

[discord]
webhook_url = {webhook_url}

[relay]
# "photos" forwards only photos as attachments, "all" forwards every file
media = {media}
"#
    )
}

/// Accepts "photos"/"all" in any case; anything else falls back to "photos".
fn normalize_media(input: &str) -> &'static str {
    if input.trim().eq_ignore_ascii_case("all") {
        "all"
    } else {
        "photos"
    }
}

// ── CLI ────────────────────────────────────────────────────────────────────────

fn run_cli(project_root: &Path) -> Result<()> {
    use std::io::{self, Write};

    println!("=== tgrelay Setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let bot_token = read_line("Telegram bot token: ")?;
    let channel = read_line("Telegram channel (username or id): ")?;
    let webhook_url = read_line("Discord webhook URL: ")?;
    let media = normalize_media(&read_line("Forward media [photos/all] (photos): ")?);
    let download_dir = read_line("Media download directory (optional): ")?;

    let config = format_config(&ConfigParams {
        bot_token: &bot_token,
        channel: &channel,
        webhook_url: &webhook_url,
        media,
        download_dir: &download_dir,
    });

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the relay with:  cargo run");
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    // Resolve project root: prefer TGRELAY_ROOT env, fall back to cwd.
    let project_root =
        PathBuf::from(std::env::var("TGRELAY_ROOT").unwrap_or_else(|_| ".".to_string()));

    run_cli(&project_root)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

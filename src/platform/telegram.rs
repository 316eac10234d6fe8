use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tempfile::NamedTempFile;
use teloxide::dispatching::UpdateHandler;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, MediaKind as TgMediaKind, MessageKind, Recipient};
use teloxide::{ApiError, RequestError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::platform::{
    DownloadedMedia, IncomingMessage, MediaFetcher, MediaKind, MediaRef, SenderInfo,
};
use crate::relay::Relay;
use crate::resolver::{ChannelDirectory, ChannelHandle, ChannelQuery};

/// Convert a Telegram message into the platform-agnostic form.
///
/// Service messages (member joins, pins, title changes) carry nothing to relay and yield `None`.
pub fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    if !matches!(msg.kind, MessageKind::Common(_)) {
        return None;
    }

    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();

    // Channel posts and anonymous admins carry `sender_chat`; regular users carry `from`.
    let sender = match (&msg.sender_chat, &msg.from) {
        (Some(chat), _) => Some(match chat.title() {
            Some(title) => SenderInfo::Channel {
                title: title.to_string(),
            },
            None => SenderInfo::Unknown,
        }),
        (None, Some(user)) => Some(SenderInfo::User {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }),
        (None, None) => None,
    };

    Some(IncomingMessage {
        text,
        media: media_ref(msg),
        sender,
        timestamp: msg.date,
    })
}

fn media_ref(msg: &Message) -> Option<MediaRef> {
    let MessageKind::Common(common) = &msg.kind else {
        return None;
    };

    let (kind, file_id, file_name) = match &common.media_kind {
        TgMediaKind::Text(_) => return None,
        // Largest size is last
        TgMediaKind::Photo(p) => (
            MediaKind::Photo,
            p.photo.last().map(|ps| ps.file.id.to_string()),
            None,
        ),
        TgMediaKind::Video(v) => (
            MediaKind::Video,
            Some(v.video.file.id.to_string()),
            v.video.file_name.clone(),
        ),
        TgMediaKind::Animation(a) => (
            MediaKind::Animation,
            Some(a.animation.file.id.to_string()),
            a.animation.file_name.clone(),
        ),
        TgMediaKind::Document(d) => (
            MediaKind::Document,
            Some(d.document.file.id.to_string()),
            d.document.file_name.clone(),
        ),
        TgMediaKind::Audio(a) => (
            MediaKind::Audio,
            Some(a.audio.file.id.to_string()),
            a.audio.file_name.clone(),
        ),
        TgMediaKind::Voice(v) => (MediaKind::Voice, Some(v.voice.file.id.to_string()), None),
        _ => (MediaKind::Other, None, None),
    };

    Some(MediaRef {
        kind,
        file_id,
        file_name,
    })
}

/// Resolves channels with `getChat`
pub struct TelegramDirectory {
    bot: Bot,
}

impl TelegramDirectory {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChannelDirectory for TelegramDirectory {
    async fn lookup(&self, query: &ChannelQuery) -> Result<Option<ChannelHandle>> {
        let recipient = match query {
            ChannelQuery::Username(name) | ChannelQuery::Literal(name) => {
                Recipient::ChannelUsername(name.clone())
            }
            ChannelQuery::Id(id) => Recipient::Id(ChatId(*id)),
        };

        match self.bot.get_chat(recipient).await {
            Ok(chat) => Ok(Some(ChannelHandle {
                id: chat.id.0,
                title: chat.title().map(str::to_string),
            })),
            Err(RequestError::Api(ApiError::InvalidToken)) => {
                anyhow::bail!("Telegram rejected the bot token")
            }
            // Any other API-level rejection means this interpretation is not a chat the bot can see
            Err(RequestError::Api(e)) => {
                debug!("getChat rejected {}: {}", query, e);
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("Failed to look up channel by {query}")),
        }
    }
}

/// Downloads message media through the Bot API into temp files
pub struct TelegramMedia {
    bot: Bot,
    download_dir: Option<PathBuf>,
}

impl TelegramMedia {
    pub fn new(bot: Bot, download_dir: Option<PathBuf>) -> Self {
        Self { bot, download_dir }
    }

    fn temp_file(&self) -> Result<NamedTempFile> {
        let file = match &self.download_dir {
            Some(dir) => NamedTempFile::new_in(dir)
                .with_context(|| format!("Failed to create temp file in {}", dir.display()))?,
            None => NamedTempFile::new().context("Failed to create temp file")?,
        };
        Ok(file)
    }
}

#[async_trait]
impl MediaFetcher for TelegramMedia {
    async fn fetch(&self, media: &MediaRef) -> Result<DownloadedMedia> {
        let file_id = media
            .file_id
            .as_deref()
            .with_context(|| format!("{} media has no downloadable file", media.kind))?;

        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .context("Failed to get file info from Telegram")?;

        let temp = self.temp_file()?;
        let mut dst = tokio::fs::File::create(temp.path())
            .await
            .with_context(|| format!("Failed to open {}", temp.path().display()))?;
        self.bot
            .download_file(&file.path, &mut dst)
            .await
            .context("Failed to download file from Telegram")?;
        dst.flush().await.context("Failed to flush downloaded file")?;

        debug!("Downloaded {} to {}", media.kind, temp.path().display());

        let name = media
            .file_name
            .clone()
            .unwrap_or_else(|| media.kind.default_file_name().to_string());
        Ok(DownloadedMedia::new(temp, name))
    }
}

/// Verify the bot token; returns the bot's display name.
pub async fn authenticate(bot: &Bot) -> Result<String> {
    let me = bot
        .get_me()
        .await
        .context("Failed to authenticate with Telegram")?;
    Ok(me.user.first_name.clone())
}

/// Routes new content posts of `chat_id` to the relay.
///
/// Updates from other chats and service messages fall through unhandled.
pub fn schema(chat_id: ChatId) -> UpdateHandler<RequestError> {
    // Groups deliver `message` updates, broadcast channels deliver `channel_post`.
    dptree::entry()
        .branch(
            Update::filter_message()
                .filter(move |msg: Message| msg.chat.id == chat_id)
                .filter_map(|msg: Message| incoming_message(&msg))
                .endpoint(handle_message),
        )
        .branch(
            Update::filter_channel_post()
                .filter(move |msg: Message| msg.chat.id == chat_id)
                .filter_map(|msg: Message| incoming_message(&msg))
                .endpoint(handle_message),
        )
}

/// Listen for new posts in `channel` and hand each one to the relay.
///
/// Returns when the dispatcher stops (Ctrl-C or a fatal polling error).
pub async fn run(bot: Bot, channel: ChannelHandle, relay: Arc<Relay>) -> Result<()> {
    info!("Starting Telegram listener for {}...", channel.display_name());

    Dispatcher::builder(bot, schema(ChatId(channel.id)))
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            debug!("Ignoring update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram listener stopped");
    Ok(())
}

async fn handle_message(
    msg: Message,
    incoming: IncomingMessage,
    relay: Arc<Relay>,
) -> ResponseResult<()> {
    debug!("New message {} in chat {}", msg.id.0, msg.chat.id.0);
    relay.handle(incoming).await;
    Ok(())
}

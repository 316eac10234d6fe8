use anyhow::{Context, Result};
use tracing::debug;

use crate::config::MediaPolicy;
use crate::discord::{Attachment, Embed, EmbedAuthor, OutgoingPayload};
use crate::platform::{IncomingMessage, MediaFetcher, MediaKind, MediaRef};

pub const EMBED_TITLE: &str = "Telegram Message";
pub const EMBED_COLOR: u32 = 0x03b2f8;

/// Photos are always uploaded under this name
const PHOTO_FILE_NAME: &str = "photo.jpg";

/// Turns source messages into webhook payloads
pub struct Transformer {
    media_policy: MediaPolicy,
}

impl Transformer {
    pub fn new(media_policy: MediaPolicy) -> Self {
        Self { media_policy }
    }

    fn should_attach(&self, media: &MediaRef) -> bool {
        if media.file_id.is_none() {
            return false;
        }
        match (self.media_policy, media.kind) {
            (_, MediaKind::Photo) => true,
            (_, MediaKind::Other) => false,
            (MediaPolicy::All, _) => true,
            (MediaPolicy::Photos, _) => false,
        }
    }

    pub async fn transform(
        &self,
        msg: &IncomingMessage,
        fetcher: &dyn MediaFetcher,
    ) -> Result<OutgoingPayload> {
        let attachment = match &msg.media {
            Some(media) if self.should_attach(media) => {
                Some(self.download(media, fetcher).await?)
            }
            Some(media) => {
                debug!(
                    "Not attaching {} media (policy: {})",
                    media.kind, self.media_policy
                );
                None
            }
            None => None,
        };

        let author = msg.sender.as_ref().map(|sender| EmbedAuthor {
            name: sender.display_name(),
        });

        Ok(OutgoingPayload {
            embed: Embed {
                title: EMBED_TITLE.to_string(),
                description: msg.text.clone(),
                color: EMBED_COLOR,
                author,
                timestamp: msg.timestamp,
            },
            attachment,
        })
    }

    async fn download(&self, media: &MediaRef, fetcher: &dyn MediaFetcher) -> Result<Attachment> {
        let downloaded = fetcher
            .fetch(media)
            .await
            .with_context(|| format!("Failed to download {} media", media.kind))?;

        let file_name = match media.kind {
            MediaKind::Photo => PHOTO_FILE_NAME.to_string(),
            _ => downloaded.file_name.clone(),
        };

        // Consumes the download; the temp file is gone whether or not the read succeeds.
        let data = downloaded.into_bytes().await?;

        Ok(Attachment { file_name, data })
    }
}

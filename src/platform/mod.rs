pub mod telegram;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::warn;

/// A message received from the source channel
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Message text or media caption; empty when neither is present
    pub text: String,
    pub media: Option<MediaRef>,
    pub sender: Option<SenderInfo>,
    pub timestamp: DateTime<Utc>,
}

/// Who posted a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderInfo {
    Channel { title: String },
    User {
        first_name: String,
        last_name: Option<String>,
    },
    Unknown,
}

impl SenderInfo {
    pub fn display_name(&self) -> String {
        match self {
            SenderInfo::Channel { title } => title.clone(),
            SenderInfo::User {
                first_name,
                last_name,
            } => match last_name.as_deref() {
                Some(last) if !last.is_empty() => format!("{first_name} {last}"),
                _ => first_name.clone(),
            },
            SenderInfo::Unknown => "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Document,
    Audio,
    Voice,
    /// Locations, polls, stickers and anything else without a forwardable file
    Other,
}

impl MediaKind {
    /// Attachment name used when the platform supplies none.
    pub fn default_file_name(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo.jpg",
            MediaKind::Video => "video.mp4",
            MediaKind::Animation => "animation.mp4",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio.mp3",
            MediaKind::Voice => "voice.ogg",
            MediaKind::Other => "file",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Animation => "animation",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Reference to media attached to a message; the content is fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    /// Platform file id; `None` for media that has no downloadable file
    pub file_id: Option<String>,
    pub file_name: Option<String>,
}

/// Downloaded media staged in a temp file.
///
/// The file is removed when this value is dropped, so a failed read or an
/// abandoned forward never leaves it behind.
#[derive(Debug)]
pub struct DownloadedMedia {
    file: NamedTempFile,
    pub file_name: String,
}

impl DownloadedMedia {
    pub fn new(file: NamedTempFile, file_name: impl Into<String>) -> Self {
        Self {
            file,
            file_name: file_name.into(),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }

    /// Read the content and delete the temp file.
    pub async fn into_bytes(self) -> Result<Vec<u8>> {
        let read = tokio::fs::read(self.file.path())
            .await
            .with_context(|| format!("Failed to read {}", self.file.path().display()));

        if let Err(e) = self.file.close() {
            warn!("Failed to remove downloaded media: {}", e);
        }

        read
    }
}

/// Fetches full media content from the source platform
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<DownloadedMedia>;
}

/// Media fetcher stand-in for transform and relay tests.
#[cfg(test)]
pub mod testing {
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    /// Writes fixed bytes into a temp file and remembers where.
    pub struct FakeFetcher {
        dir: TempDir,
        paths: Mutex<Vec<PathBuf>>,
        fail: bool,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                paths: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        /// Paths of every temp file handed out so far
        pub fn fetched(&self) -> Vec<PathBuf> {
            self.paths.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaFetcher for FakeFetcher {
        async fn fetch(&self, media: &MediaRef) -> Result<DownloadedMedia> {
            if self.fail {
                anyhow::bail!("download refused");
            }
            let mut file = NamedTempFile::new_in(self.dir.path())?;
            file.write_all(b"media-bytes")?;
            self.paths.lock().unwrap().push(file.path().to_path_buf());
            let name = media
                .file_name
                .clone()
                .unwrap_or_else(|| media.kind.default_file_name().to_string());
            Ok(DownloadedMedia::new(file, name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn user(first: &str, last: Option<&str>) -> SenderInfo {
        SenderInfo::User {
            first_name: first.to_string(),
            last_name: last.map(str::to_string),
        }
    }

    #[test]
    fn test_user_name_with_last_name() {
        assert_eq!(user("Ann", Some("Lee")).display_name(), "Ann Lee");
    }

    #[test]
    fn test_user_name_without_last_name() {
        assert_eq!(user("Ann", None).display_name(), "Ann");
        assert_eq!(user("Ann", Some("")).display_name(), "Ann");
    }

    #[test]
    fn test_channel_and_unknown_names() {
        let channel = SenderInfo::Channel {
            title: "Daily News".into(),
        };
        assert_eq!(channel.display_name(), "Daily News");
        assert_eq!(SenderInfo::Unknown.display_name(), "Unknown");
    }

    #[tokio::test]
    async fn test_into_bytes_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = NamedTempFile::new_in(dir.path()).unwrap();
        file.write_all(b"jpeg bytes").unwrap();
        let path = file.path().to_path_buf();

        let media = DownloadedMedia::new(file, "photo.jpg");
        assert_eq!(media.into_bytes().await.unwrap(), b"jpeg bytes");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = NamedTempFile::new_in(dir.path()).unwrap();
        let media = DownloadedMedia::new(file, "photo.jpg");
        let path = media.path().to_path_buf();
        assert!(path.exists());

        drop(media);
        assert!(!path.exists());
    }
}

//! Telegram-native media: replied audio/voice/video/documents and files
//! linked from the download API

use super::fetch::{discard_partial, partial_path, publish_partial};
use super::query::parse_tg_link;
use crate::{Result, VcError};
use std::path::{Path, PathBuf};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{MessageId, Recipient};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Playable media attached to a message
#[derive(Debug, Clone)]
pub struct TelegramMedia {
    pub file_id: String,
    pub unique_id: String,
    pub title: String,
    pub artist: String,
    /// 0 when Telegram does not know
    pub duration_secs: u64,
    pub mime_type: Option<String>,
}

impl TelegramMedia {
    /// Audio, voice, video, or an audio/video document
    pub fn from_message(msg: &Message) -> Option<Self> {
        if let Some(audio) = msg.audio() {
            return Some(Self::build(
                &audio.file,
                audio.title.clone().or_else(|| audio.file_name.clone()),
                audio.performer.clone(),
                audio.duration.seconds(),
                audio.mime_type.as_ref().map(ToString::to_string),
            ));
        }
        if let Some(voice) = msg.voice() {
            return Some(Self::build(
                &voice.file,
                None,
                None,
                voice.duration.seconds(),
                voice.mime_type.as_ref().map(ToString::to_string),
            ));
        }
        if let Some(video) = msg.video() {
            return Some(Self::build(
                &video.file,
                video.file_name.clone(),
                None,
                video.duration.seconds(),
                video.mime_type.as_ref().map(ToString::to_string),
            ));
        }
        if let Some(document) = msg.document() {
            let mime = document.mime_type.as_ref()?.to_string();
            if is_playable_mime(&mime) {
                return Some(Self::build(
                    &document.file,
                    document.file_name.clone(),
                    None,
                    0,
                    Some(mime),
                ));
            }
        }
        None
    }

    fn build(
        file: &teloxide::types::FileMeta,
        title: Option<String>,
        performer: Option<String>,
        duration: u32,
        mime_type: Option<String>,
    ) -> Self {
        Self {
            file_id: file.id.clone(),
            unique_id: file.unique_id.to_string(),
            title: title.unwrap_or_else(|| "Telegram Audio".to_string()),
            artist: performer.unwrap_or_else(|| "Unknown Artist".to_string()),
            duration_secs: u64::from(duration),
            mime_type,
        }
    }

    pub fn is_video(&self) -> bool {
        self.mime_type
            .as_deref()
            .is_some_and(|mime| mime.contains("video"))
    }

    /// Cache location under `dir`
    pub fn file_path(&self, dir: &Path) -> PathBuf {
        let extension = if self.is_video() { "mp4" } else { "mp3" };
        dir.join(format!("tg_{}.{}", self.unique_id, extension))
    }

    /// Download through the Bot API into `dest`
    pub async fn download(&self, bot: &Bot, dest: &Path) -> Result<()> {
        download_file_id(bot, &self.file_id, dest).await
    }
}

pub fn is_playable_mime(mime: &str) -> bool {
    mime.starts_with("audio/") || mime.starts_with("video/")
}

async fn download_file_id(bot: &Bot, file_id: &str, dest: &Path) -> Result<()> {
    let file = bot.get_file(file_id.to_string()).await?;
    let part = partial_path(dest);

    let mut dst = fs::File::create(&part).await?;
    let outcome = match bot.download_file(&file.path, &mut dst).await {
        Ok(()) => dst.flush().await.map_err(VcError::from),
        Err(e) => Err(VcError::Download(e.to_string())),
    };
    drop(dst);
    if let Err(e) = outcome {
        discard_partial(&part).await;
        return Err(e);
    }

    publish_partial(&part, dest).await?;
    info!("Downloaded Telegram file to {}", dest.display());
    Ok(())
}

/// Fetch the file behind a `t.me/<channel>/<id>` link.
///
/// Bots cannot read arbitrary channel history, so the message is forwarded
/// into `relay_chat`, downloaded from there and the copy deleted again.
pub async fn fetch_linked_file(
    bot: &Bot,
    link: &str,
    relay_chat: Option<ChatId>,
    dest: &Path,
) -> Result<()> {
    let (channel, message_id) = parse_tg_link(link)
        .ok_or_else(|| VcError::Download("Invalid download link format.".into()))?;
    let relay_chat = relay_chat.ok_or_else(|| {
        VcError::Download("a log group is required to fetch Telegram links".into())
    })?;

    debug!("Relaying t.me/{}/{} through chat {}", channel, message_id, relay_chat);
    let forwarded = bot
        .forward_message(
            relay_chat,
            Recipient::ChannelUsername(format!("@{}", channel)),
            MessageId(message_id),
        )
        .await?;

    let result = match TelegramMedia::from_message(&forwarded) {
        Some(media) => media.download(bot, dest).await,
        None => Err(VcError::Download(format!(
            "t.me/{}/{} carries no audio or video",
            channel, message_id
        ))),
    };

    if let Err(e) = bot.delete_message(relay_chat, forwarded.id).await {
        warn!("Failed to delete relayed message: {}", e);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playable_mime() {
        assert!(is_playable_mime("audio/mpeg"));
        assert!(is_playable_mime("video/mp4"));
        assert!(!is_playable_mime("application/pdf"));
        assert!(!is_playable_mime("image/png"));
    }

    #[test]
    fn test_file_path_extension() {
        let mut media = TelegramMedia {
            file_id: "AgAD".to_string(),
            unique_id: "AQADx".to_string(),
            title: "Telegram Audio".to_string(),
            artist: "Unknown Artist".to_string(),
            duration_secs: 0,
            mime_type: Some("audio/ogg".to_string()),
        };
        assert_eq!(
            media.file_path(Path::new("downloads")),
            PathBuf::from("downloads/tg_AQADx.mp3")
        );

        media.mime_type = Some("video/mp4".to_string());
        assert!(media.is_video());
        assert_eq!(
            media.file_path(Path::new("downloads")),
            PathBuf::from("downloads/tg_AQADx.mp4")
        );
    }

    #[test]
    fn test_from_audio_message() {
        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 3,
            "date": 1_700_000_000,
            "chat": {"id": -100_123, "type": "supergroup", "title": "Music Group"},
            "audio": {
                "file_id": "CQACAgIAAxkBAAIB",
                "file_unique_id": "AgADx",
                "file_size": 1024,
                "duration": 185,
                "performer": "Band",
                "title": "Song",
                "mime_type": "audio/mpeg"
            }
        }))
        .unwrap();

        let media = TelegramMedia::from_message(&msg).unwrap();
        assert_eq!(media.file_id, "CQACAgIAAxkBAAIB");
        assert_eq!(media.unique_id, "AgADx");
        assert_eq!(media.title, "Song");
        assert_eq!(media.artist, "Band");
        assert_eq!(media.duration_secs, 185);
        assert!(!media.is_video());
    }
}

use crate::{Result, VcError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamKind {
    Audio,
    Video,
}

impl StreamKind {
    /// `vplay` streams video, everything else is audio only
    pub fn from_command(command: &str) -> Self {
        if command.starts_with('v') {
            StreamKind::Video
        } else {
            StreamKind::Audio
        }
    }

    /// Extension used for cached downloads of this kind
    pub fn extension(&self) -> &'static str {
        match self {
            StreamKind::Audio => "mp3",
            StreamKind::Video => "mp4",
        }
    }

    /// Format name understood by the download API
    pub fn api_format(&self) -> &'static str {
        match self {
            StreamKind::Audio => "audio",
            StreamKind::Video => "video",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamKind::Audio => write!(f, "Audio"),
            StreamKind::Video => write!(f, "Video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioQuality {
    /// 96 kHz stereo
    #[default]
    Studio,
}

impl AudioQuality {
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioQuality::Studio => 96_000,
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            AudioQuality::Studio => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoQuality {
    /// 1280x720 at 30 fps
    #[default]
    Hd720p,
}

impl VideoQuality {
    pub fn width(&self) -> u32 {
        match self {
            VideoQuality::Hd720p => 1280,
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            VideoQuality::Hd720p => 720,
        }
    }

    pub fn fps(&self) -> u32 {
        match self {
            VideoQuality::Hd720p => 30,
        }
    }
}

/// A playable source and its encoding parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    pub path: PathBuf,
    pub kind: StreamKind,
    pub audio: AudioQuality,
    /// `None` for audio-only streams
    pub video: Option<VideoQuality>,
}

impl MediaStream {
    /// Build a stream for a file on disk
    pub fn new(path: impl Into<PathBuf>, kind: StreamKind) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(VcError::MediaStream(format!(
                "media file not found: {}",
                path.display()
            )));
        }

        Ok(Self {
            path,
            kind,
            audio: AudioQuality::Studio,
            video: match kind {
                StreamKind::Audio => None,
                StreamKind::Video => Some(VideoQuality::Hd720p),
            },
        })
    }
}

/// Who asked for a track
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: Option<i64>,
    pub name: String,
    pub username: Option<String>,
}

impl Requester {
    pub fn user(user_id: i64, name: impl Into<String>, username: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            name: name.into(),
            username,
        }
    }

    /// A sender chat (channel or anonymous admin)
    pub fn chat(chat_id: i64, title: impl Into<String>, username: Option<String>) -> Self {
        Self {
            user_id: Some(chat_id),
            name: title.into(),
            username,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            name: "Anonymous User".to_string(),
            username: None,
        }
    }

    /// HTML mention; anonymous requesters link to the bot instead
    pub fn mention_html(&self, bot_username: &str) -> String {
        match (self.user_id, &self.username) {
            (_, Some(username)) => format!(
                "<a href=\"https://t.me/{}\">{}</a>",
                username,
                escape_html(&self.name)
            ),
            (Some(id), None) if id > 0 => format!(
                "<a href=\"tg://user?id={}\">{}</a>",
                id,
                escape_html(&self.name)
            ),
            (Some(_), None) => escape_html(&self.name),
            (None, None) => format!(
                "<a href=\"https://t.me/{}\">{}</a>",
                bot_username,
                escape_html(&self.name)
            ),
        }
    }

    /// `@username` when available, otherwise the display name
    pub fn handle(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => self.name.clone(),
        }
    }
}

/// One queued track
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub media_stream: MediaStream,
    pub title: String,
    /// Display duration, e.g. `3m 25s`
    pub duration: String,
    /// 0 when unknown
    pub duration_secs: u64,
    pub thumbnail: PathBuf,
    pub requester: Requester,
    pub file_path: PathBuf,
    pub requested_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(
        media_stream: MediaStream,
        title: impl Into<String>,
        duration_secs: u64,
        requester: Requester,
    ) -> Self {
        let file_path = media_stream.path.clone();
        Self {
            id: Uuid::new_v4(),
            media_stream,
            title: title.into(),
            duration: if duration_secs > 0 {
                crate::utils::time::format_duration(duration_secs)
            } else {
                "Unknown".to_string()
            },
            duration_secs,
            thumbnail: PathBuf::new(),
            requester,
            file_path,
            requested_at: Utc::now(),
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: impl AsRef<Path>) -> Self {
        self.thumbnail = thumbnail.as_ref().to_path_buf();
        self
    }
}

/// Escape text for Telegram HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_from_command() {
        assert_eq!(StreamKind::from_command("play"), StreamKind::Audio);
        assert_eq!(StreamKind::from_command("vplay"), StreamKind::Video);
        assert_eq!(StreamKind::Video.extension(), "mp4");
    }

    #[test]
    fn test_media_stream_requires_file() {
        let err = MediaStream::new("/definitely/not/here.mp3", StreamKind::Audio).unwrap_err();
        assert!(matches!(err, VcError::MediaStream(_)));

        let file = tempfile::NamedTempFile::new().unwrap();
        let audio = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
        assert_eq!(audio.video, None);
        let video = MediaStream::new(file.path(), StreamKind::Video).unwrap();
        assert_eq!(video.video, Some(VideoQuality::Hd720p));
    }

    #[test]
    fn test_mentions() {
        let user = Requester::user(42, "A <B>", None);
        assert_eq!(
            user.mention_html("vcbot"),
            "<a href=\"tg://user?id=42\">A &lt;B&gt;</a>"
        );

        let anon = Requester::anonymous();
        assert_eq!(
            anon.mention_html("vcbot"),
            "<a href=\"https://t.me/vcbot\">Anonymous User</a>"
        );

        let named = Requester::user(7, "Sam", Some("sam".into()));
        assert_eq!(named.handle(), "@sam");
    }

    #[test]
    fn test_entry_duration_label() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
        let entry = QueueEntry::new(stream.clone(), "Song", 205, Requester::anonymous());
        assert_eq!(entry.duration, "3m 25s");
        assert_eq!(entry.file_path, stream.path);

        let unknown = QueueEntry::new(stream, "Voice", 0, Requester::anonymous());
        assert_eq!(unknown.duration, "Unknown");
    }
}

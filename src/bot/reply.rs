//! Reply texts, keyboards and the status message shown while a play
//! request is processed. All texts use Telegram HTML parse mode.

use crate::media::{escape_html, QueueEntry, StreamKind};
use crate::utils::seconds_to_hhmmss;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, ParseMode};
use tracing::{debug, warn};

/// Callback data of the close button
pub const CLOSE_CALLBACK: &str = "close";

pub const ADMIN_ONLY: &str = "❌ Only admins can use this command.";

pub const PLAY_USAGE: &str = "<b>🥀 Give Me Some Query To Stream Audio Or Video❗...\n\
ℹ️ Example:\n\
≽ Audio: <code>/play yalgaar</code>\n\
≽ Video: <code>/vplay yalgaar</code>\n\
≽ Reply to audio/video: <code>/play</code> or <code>/vplay</code></b>";

pub const SEEK_USAGE: &str = "⚠️ Usage:\n\
• <code>/seek 60</code> → jump to 60 seconds\n\
• <code>/seek 1:30</code> → jump to 1 minute 30 seconds";

pub const SEEK_INVALID: &str = "❌ Invalid seek position.\n\
Use seconds (e.g. <code>/seek 90</code>) or mm:ss (e.g. <code>/seek 1:30</code>).";

pub const PROCESSING_YOUTUBE: &str = "<b>🔄 Processing YouTube Query ✨...</b>";
pub const PROCESSING_TELEGRAM: &str = "<b>🔄 Processing Telegram Media ✨...</b>";
pub const DOWNLOADING: &str = "⬇️ <b>Downloading ✨...</b>";

/// Titles are cut to this many characters in captions
pub const TITLE_CHARS: usize = 30;

pub fn close_markup() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "🗑️ Close",
        CLOSE_CALLBACK,
    )]])
}

pub fn truncate_title(title: &str, max_chars: usize) -> String {
    title.chars().take(max_chars).collect()
}

/// Caption for a YouTube play. `title` is already truncated.
pub fn youtube_caption(position: usize, title: &str, link: &str, duration: &str, mention: &str) -> String {
    let status = if position == 0 {
        "✅ <b>Started Streaming in VC.</b>".to_string()
    } else {
        format!("✅ <b>Added To Queue At: #{}</b>", position)
    };

    format!(
        "{}\n\n<b>❍ Title:</b> <a href=\"{}\">{}...</a>\n<b>❍ Duration:</b> {}\n<b>❍ Requested By:</b> {}",
        status,
        escape_html(link),
        escape_html(title),
        escape_html(duration),
        mention
    )
}

/// Caption for media replied to in the chat
pub fn telegram_caption(position: usize, title: &str, artist: &str, duration: &str, mention: &str) -> String {
    let status = if position == 0 {
        "✅ <b>Started Streaming Telegram Media in VC.</b>".to_string()
    } else {
        format!("✅ <b>Telegram Media Added To Queue At: #{}</b>", position)
    };

    format!(
        "{}\n\n<b>❍ Title:</b> {}\n<b>❍ Artist:</b> {}\n<b>❍ Duration:</b> {}\n<b>❍ Source:</b> Telegram Media\n<b>❍ Requested By:</b> {}",
        status,
        escape_html(title),
        escape_html(artist),
        escape_html(duration),
        mention
    )
}

/// Fields of the play log posted to the log group
#[derive(Debug, Clone)]
pub struct PlayLog {
    pub mention: String,
    pub chat_name: String,
    pub chat_link: String,
    pub chat_id: ChatId,
    pub requester: String,
    pub user_id: Option<i64>,
    pub query: String,
    pub title: String,
    pub link: String,
    pub duration: String,
    pub kind: StreamKind,
}

impl PlayLog {
    pub fn render(&self) -> String {
        format!(
            "🎉 <b>{} Just Played A Song.</b>\n\n\
             📍 <b>Chat:</b> {}\n\
             💬 <b>Chat Link:</b> {}\n\
             ♂️ <b>Chat ID:</b> {}\n\
             👤 <b>Requested By:</b> {}\n\
             🆔 <b>User ID:</b> <code>{}</code>\n\
             🔎 <b>Query:</b> {}\n\
             🎶 <b>Title:</b> <a href=\"{}\">{}...</a>\n\
             ⏱️ <b>Duration:</b> {}\n\
             📡 <b>Stream Type:</b> {}",
            self.mention,
            escape_html(&self.chat_name),
            self.chat_link,
            self.chat_id,
            escape_html(&self.requester),
            self.user_id.map_or_else(|| "N/A".to_string(), |id| id.to_string()),
            escape_html(&self.query),
            escape_html(&self.link),
            escape_html(&self.title),
            escape_html(&self.duration),
            self.kind
        )
    }
}

/// `/queue` listing; the first entry is the one streaming
pub fn queue_listing(entries: &[QueueEntry], played_secs: Option<u64>, paused: bool) -> String {
    let Some((current, pending)) = entries.split_first() else {
        return "📭 <b>Queue is empty.</b>".to_string();
    };

    let state = if paused { "⏸ Paused" } else { "▶️ Now Streaming" };
    let progress = match (played_secs, current.duration_secs) {
        (Some(played), total) if total > 0 => {
            format!("{} / {}", seconds_to_hhmmss(played), seconds_to_hhmmss(total))
        }
        (Some(played), _) => seconds_to_hhmmss(played),
        (None, _) => current.duration.clone(),
    };

    let mut text = format!(
        "<b>{}:</b> {}\n<b>❍ Progress:</b> {}\n<b>❍ Requested By:</b> {}\n",
        state,
        escape_html(&current.title),
        progress,
        escape_html(&current.requester.handle())
    );

    if !pending.is_empty() {
        text.push_str("\n<b>📋 Up Next:</b>\n");
        for (i, entry) in pending.iter().enumerate() {
            text.push_str(&format!(
                "<b>#{}</b> {} ({})\n",
                i + 1,
                escape_html(&entry.title),
                escape_html(&entry.duration)
            ));
        }
    }

    text
}

/// Send a photo card with the close button, falling back to plain text
pub async fn send_card(bot: &Bot, chat: ChatId, card: &Path, caption: String) -> ResponseResult<()> {
    let sent = bot
        .send_photo(chat, InputFile::file(card))
        .caption(caption.clone())
        .parse_mode(ParseMode::Html)
        .has_spoiler(true)
        .reply_markup(close_markup())
        .await;

    if let Err(e) = sent {
        warn!("Failed to send card {}: {}", card.display(), e);
        bot.send_message(
            chat,
            format!("{}\n\n❌ Failed to send thumbnail: {}", caption, escape_html(&e.to_string())),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(close_markup())
        .await?;
    }
    Ok(())
}

/// Progress message of a play request.
///
/// Errors replace its text; on success it is deleted. When the first send
/// fails, later updates go out as new messages.
pub struct StatusMessage {
    chat: ChatId,
    message: Option<Message>,
}

impl StatusMessage {
    pub async fn send(bot: &Bot, chat: ChatId, text: &str) -> Self {
        let message = match bot.send_message(chat, text).parse_mode(ParseMode::Html).await {
            Ok(message) => Some(message),
            Err(e) => {
                debug!("Failed to send status message: {}", e);
                None
            }
        };
        Self { chat, message }
    }

    /// Replace the status text (HTML)
    pub async fn update(&self, bot: &Bot, text: &str) {
        if let Some(message) = &self.message {
            if bot
                .edit_message_text(self.chat, message.id, text)
                .parse_mode(ParseMode::Html)
                .await
                .is_ok()
            {
                return;
            }
        }
        if let Err(e) = bot.send_message(self.chat, text).parse_mode(ParseMode::Html).await {
            warn!("Failed to report status in chat {}: {}", self.chat, e);
        }
    }

    pub async fn delete(&self, bot: &Bot) {
        if let Some(message) = &self.message {
            if let Err(e) = bot.delete_message(self.chat, message.id).await {
                debug!("Failed to delete status message: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaStream, Requester};
    use std::path::PathBuf;

    fn entry(title: &str, secs: u64) -> QueueEntry {
        let stream = MediaStream {
            path: PathBuf::from("downloads/x.mp3"),
            kind: StreamKind::Audio,
            audio: crate::media::AudioQuality::Studio,
            video: None,
        };
        QueueEntry::new(stream, title, secs, Requester::user(1, "Ann", Some("ann".into())))
    }

    #[test]
    fn test_youtube_caption_status() {
        let first = youtube_caption(0, "Song", "https://www.youtube.com/watch?v=x", "3m 5s", "Ann");
        assert!(first.starts_with("✅ <b>Started Streaming in VC.</b>"));
        assert!(first.contains("<a href=\"https://www.youtube.com/watch?v=x\">Song...</a>"));

        let queued = youtube_caption(2, "Song", "https://x", "3m 5s", "Ann");
        assert!(queued.starts_with("✅ <b>Added To Queue At: #2</b>"));
    }

    #[test]
    fn test_telegram_caption_escapes() {
        let caption = telegram_caption(0, "a<b>", "A & B", "Unknown", "Ann");
        assert!(caption.contains("Started Streaming Telegram Media in VC."));
        assert!(caption.contains("a&lt;b&gt;"));
        assert!(caption.contains("A &amp; B"));
        assert!(caption.contains("<b>❍ Source:</b> Telegram Media"));

        let queued = telegram_caption(1, "t", "a", "1m", "Ann");
        assert!(queued.contains("Telegram Media Added To Queue At: #1"));
    }

    #[test]
    fn test_truncate_title_counts_chars() {
        assert_eq!(truncate_title("héllo wörld", 5), "héllo");
        assert_eq!(truncate_title("short", TITLE_CHARS), "short");
    }

    #[test]
    fn test_queue_listing() {
        assert!(queue_listing(&[], None, false).contains("Queue is empty"));

        let entries = vec![entry("Current", 200), entry("Next", 0)];
        let text = queue_listing(&entries, Some(65), false);
        assert!(text.contains("Now Streaming:</b> Current"));
        assert!(text.contains("01:05 / 03:20"));
        assert!(text.contains("<b>#1</b> Next (Unknown)"));
        assert!(text.contains("@ann"));

        assert!(queue_listing(&entries, Some(0), true).contains("Paused"));
    }

    #[test]
    fn test_play_log() {
        let log = PlayLog {
            mention: "Ann".into(),
            chat_name: "Group".into(),
            chat_link: "@group".into(),
            chat_id: ChatId(-100),
            requester: "@ann".into(),
            user_id: None,
            query: "song".into(),
            title: "Song".into(),
            link: "https://x".into(),
            duration: "3m".into(),
            kind: StreamKind::Video,
        };
        let text = log.render();
        assert!(text.contains("<code>N/A</code>"));
        assert!(text.contains("📡 <b>Stream Type:</b> Video"));
        assert!(text.contains("♂️ <b>Chat ID:</b> -100"));
    }
}

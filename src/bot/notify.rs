//! Relays engine events to the chats they concern

use super::reply::{close_markup, send_card};
use crate::call::CallEvent;
use crate::media::escape_html;
use crossbeam_channel::{Receiver, TryRecvError};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{info, warn};

/// Drain engine events until the engine is gone
pub async fn run(bot: Bot, events: Receiver<CallEvent>, bot_username: String) {
    info!("Notifier started");
    let mut ticker = tokio::time::interval(Duration::from_millis(200));

    loop {
        ticker.tick().await;

        loop {
            match events.try_recv() {
                Ok(event) => {
                    if let Err(e) = deliver(&bot, event, &bot_username).await {
                        warn!("Failed to deliver call event: {}", e);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Notifier stopped");
                    return;
                }
            }
        }
    }
}

pub fn now_playing_caption(title: &str, duration: &str, mention: &str) -> String {
    format!(
        "▶️ <b>Now streaming:</b> {} ({})\n<b>❍ Requested By:</b> {}",
        escape_html(title),
        escape_html(duration),
        mention
    )
}

async fn deliver(bot: &Bot, event: CallEvent, bot_username: &str) -> ResponseResult<()> {
    match event {
        CallEvent::NowPlaying { chat, entry } => {
            let caption = now_playing_caption(
                &entry.title,
                &entry.duration,
                &entry.requester.mention_html(bot_username),
            );
            if entry.thumbnail.is_file() {
                send_card(bot, chat, &entry.thumbnail, caption).await?;
            } else {
                bot.send_message(chat, caption)
                    .parse_mode(ParseMode::Html)
                    .reply_markup(close_markup())
                    .await?;
            }
        }
        CallEvent::QueueFinished { chat } => {
            bot.send_message(chat, "✅ Queue finished, leaving voice chat.")
                .await?;
        }
        CallEvent::Error { chat, error } => {
            bot.send_message(
                chat,
                format!("❌ <b>Skipped a track that failed to start:</b> {}", escape_html(&error)),
            )
            .parse_mode(ParseMode::Html)
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_playing_caption() {
        let caption = now_playing_caption("A & B", "3m 5s", "<a href=\"x\">Ann</a>");
        assert!(caption.starts_with("▶️ <b>Now streaming:</b> A &amp; B (3m 5s)"));
        assert!(caption.ends_with("<a href=\"x\">Ann</a>"));
    }
}

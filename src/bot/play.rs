//! `/play` and `/vplay`

use super::admin::requester_of;
use super::commands::ParsedCommand;
use super::reply::{
    self, send_card, telegram_caption, truncate_title, youtube_caption, PlayLog, StatusMessage,
};
use super::{run_engine, BotState, HandlerResult};
use crate::media::{escape_html, MediaStream, QueueEntry, StreamKind};
use crate::source::{
    cached_path, fetch_linked_file, parse_query, resolve_download, DownloadSource, TelegramMedia,
};
use crate::thumb::{prepare_cover, render_to_file, CardInfo};
use crate::utils::{convert_to_seconds, Stopwatch};
use crate::VcError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{Chat, InputFile, ParseMode};
use tracing::{debug, info, warn};

/// Why a play request stopped
#[derive(Debug)]
enum PlayError {
    /// Ready-made HTML reply
    Reply(String),
    Failed(VcError),
}

impl PlayError {
    fn reply(text: impl Into<String>) -> Self {
        PlayError::Reply(text.into())
    }

    fn text(&self) -> String {
        match self {
            PlayError::Reply(text) => text.clone(),
            PlayError::Failed(e) => escape_html(&e.user_message()),
        }
    }
}

impl From<VcError> for PlayError {
    fn from(e: VcError) -> Self {
        PlayError::Failed(e)
    }
}

impl From<teloxide::RequestError> for PlayError {
    fn from(e: teloxide::RequestError) -> Self {
        PlayError::Failed(e.into())
    }
}

pub async fn play(bot: &Bot, msg: &Message, state: &Arc<BotState>, parsed: &ParsedCommand) -> HandlerResult {
    let chat = msg.chat.id;
    if let Err(e) = bot.delete_message(chat, msg.id).await {
        debug!("Could not delete command message in {}: {}", chat, e);
    }

    let kind = StreamKind::from_command(&parsed.name);

    if let Some(media) = msg.reply_to_message().and_then(TelegramMedia::from_message) {
        let status = StatusMessage::send(bot, chat, reply::PROCESSING_TELEGRAM).await;
        if let Err(e) = stream_telegram(bot, msg, state, media, kind, &status).await {
            warn!("Telegram media play failed in {}: {:?}", chat, e);
            status.update(bot, &e.text()).await;
        }
        return Ok(());
    }

    if parsed.args.is_empty() {
        bot.send_message(chat, reply::PLAY_USAGE)
            .parse_mode(ParseMode::Html)
            .await?;
        return Ok(());
    }

    let query = parse_query(&parsed.query());
    let status = StatusMessage::send(bot, chat, reply::PROCESSING_YOUTUBE).await;
    if let Err(e) = stream_youtube(bot, msg, state, kind, &query, &status).await {
        warn!("Play failed in {} for {:?}: {:?}", chat, query, e);
        status.update(bot, &e.text()).await;
    }
    Ok(())
}

async fn stream_youtube(
    bot: &Bot,
    msg: &Message,
    state: &Arc<BotState>,
    kind: StreamKind,
    query: &str,
    status: &StatusMessage,
) -> Result<(), PlayError> {
    let chat = msg.chat.id;
    let mut timer = Stopwatch::start();

    let video = state
        .search
        .search(query)
        .await?
        .ok_or_else(|| PlayError::reply("❌ No results found."))?;
    timer.split("search");

    // Live streams carry no duration
    let Some(duration) = video.duration.as_deref() else {
        return Err(PlayError::reply("❌ I can't stream live-stream right now."));
    };
    let duration_secs = convert_to_seconds(duration)?;

    let file_path = ensure_download(bot, state, &video.id, kind, status).await?;
    timer.split("download");

    let stream = MediaStream::new(&file_path, kind)?;

    let thumbs = &state.config.thumbnail;
    let requester = requester_of(msg);
    let mention = requester.mention_html(&state.bot_username);
    let title = truncate_title(&video.title, reply::TITLE_CHARS);
    let entry = QueueEntry::new(stream, title.clone(), duration_secs, requester.clone())
        .with_thumbnail(&thumbs.fallback);
    let entry_id = entry.id;
    let duration_label = entry.duration.clone();

    let position = run_engine(&state.engine, move |engine| engine.play(chat, entry)).await?;
    timer.split("stream");

    let cover = prepare_cover(&state.http, &video.thumbnail, &thumbs.cache_dir, &thumbs.fallback).await;
    let info = CardInfo {
        title: video.title.clone(),
        artist: video.channel_name.clone(),
        duration_secs: Some(duration_secs),
    };
    let output = thumbs
        .cache_dir
        .join(format!("{}_{}_{}.png", chat.0, video.id, msg.id.0));
    let card = render_card_file(state, cover, info, output).await;
    state.engine.queue().set_thumbnail(chat, entry_id, &card);
    timer.split("thumbnail");

    status.delete(bot).await;
    send_card(
        bot,
        chat,
        &card,
        youtube_caption(position, &title, &video.link, &duration_label, &mention),
    )
    .await?;

    info!("Queued {} in {} at #{} ({})", video.id, chat, position, timer.summary());

    let log = PlayLog {
        mention,
        chat_name: String::new(),
        chat_link: String::new(),
        chat_id: chat,
        requester: requester.handle(),
        user_id: requester.user_id,
        query: query.to_string(),
        title,
        link: video.link.clone(),
        duration: duration_label,
        kind,
    };
    post_play_log(bot, state, &msg.chat, &card, log).await;

    Ok(())
}

/// Cached file for `video_id`, downloading it when missing
async fn ensure_download(
    bot: &Bot,
    state: &BotState,
    video_id: &str,
    kind: StreamKind,
    status: &StatusMessage,
) -> Result<PathBuf, PlayError> {
    let dir = &state.config.download.dir;
    tokio::fs::create_dir_all(dir).await.map_err(VcError::from)?;

    let path = cached_path(dir, video_id, kind);
    if path.is_file() {
        debug!("Using cached download {}", path.display());
        return Ok(path);
    }

    let response = state.api.fetch_song(video_id, kind).await.map_err(|e| {
        warn!("Download API failed for {}: {}", video_id, e);
        PlayError::reply("❌ Failed to process query, please try again.")
    })?;

    let source = resolve_download(&response).map_err(|e| match e {
        VcError::Download(message) => PlayError::reply(format!("❌ {}", escape_html(&message))),
        other => other.into(),
    })?;

    status.update(bot, reply::DOWNLOADING).await;

    match source {
        DownloadSource::Telegram(link) => {
            fetch_linked_file(bot, &link, state.log_chat(), &path).await?;
        }
        DownloadSource::Direct(url) => {
            state.api.download_direct(&url, &path).await.map_err(|e| {
                warn!("Direct download of {} failed: {}", video_id, e);
                PlayError::reply("❌ Failed to download from direct URL.")
            })?;
        }
    }

    Ok(path)
}

async fn stream_telegram(
    bot: &Bot,
    msg: &Message,
    state: &Arc<BotState>,
    media: TelegramMedia,
    kind: StreamKind,
    status: &StatusMessage,
) -> Result<(), PlayError> {
    let chat = msg.chat.id;
    let dir = &state.config.download.dir;
    tokio::fs::create_dir_all(dir).await.map_err(VcError::from)?;

    let path = media.file_path(dir);
    if !path.is_file() {
        media.download(bot, &path).await.map_err(|e| {
            PlayError::reply(format!("❌ Failed to download media: {}", escape_html(&e.to_string())))
        })?;
    }

    let stream = MediaStream::new(&path, kind)?;

    let thumbs = &state.config.thumbnail;
    let requester = requester_of(msg);
    let mention = requester.mention_html(&state.bot_username);
    let entry = QueueEntry::new(stream, media.title.clone(), media.duration_secs, requester)
        .with_thumbnail(&thumbs.fallback);
    let entry_id = entry.id;
    let duration_label = entry.duration.clone();

    let position = run_engine(&state.engine, move |engine| engine.play(chat, entry)).await?;

    let info = CardInfo {
        title: media.title.clone(),
        artist: media.artist.clone(),
        duration_secs: (media.duration_secs > 0).then_some(media.duration_secs),
    };
    let output = thumbs.cache_dir.join(format!("{}_tg_{}.png", chat.0, msg.id.0));
    let card = render_card_file(state, thumbs.fallback.clone(), info, output).await;
    state.engine.queue().set_thumbnail(chat, entry_id, &card);
    info!("Queued Telegram media {} in {} at #{}", media.unique_id, chat, position);

    status.delete(bot).await;
    send_card(
        bot,
        chat,
        &card,
        telegram_caption(position, &media.title, &media.artist, &duration_label, &mention),
    )
    .await?;

    Ok(())
}

/// Render the card off the async runtime; the cover itself on failure
async fn render_card_file(state: &Arc<BotState>, cover: PathBuf, info: CardInfo, output: PathBuf) -> PathBuf {
    let state = Arc::clone(state);
    let source = cover.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        let mut rng = rand::thread_rng();
        render_to_file(&source, &info, state.font.as_ref(), &mut rng, &output).map(|_| output)
    })
    .await;

    match rendered {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => {
            warn!("Thumbnail render failed: {}", e);
            cover
        }
        Err(e) => {
            warn!("Thumbnail task failed: {}", e);
            cover
        }
    }
}

/// Post the play log to the log group, unless the play happened there
async fn post_play_log(bot: &Bot, state: &BotState, chat: &Chat, card: &Path, mut log: PlayLog) {
    let Some(log_chat) = state.log_chat() else {
        return;
    };
    if log_chat == chat.id {
        return;
    }

    log.chat_name = chat.title().unwrap_or("Unknown Chat").to_string();
    log.chat_link = chat_link(bot, state, chat).await;

    if let Err(e) = bot
        .send_photo(log_chat, InputFile::file(card))
        .caption(log.render())
        .parse_mode(ParseMode::Html)
        .await
    {
        debug!("Failed to post play log: {}", e);
    }
}

async fn chat_link(bot: &Bot, state: &BotState, chat: &Chat) -> String {
    if let Some(username) = chat.username() {
        return format!("@{}", username);
    }

    let link = match state.chat_link(chat.id) {
        Some(link) => link,
        None => match bot.export_chat_invite_link(chat.id).await {
            Ok(link) => {
                state.remember_chat_link(chat.id, link.clone());
                link
            }
            Err(e) => {
                debug!("Cannot export invite link for {}: {}", chat.id, e);
                return "N/A".to_string();
            }
        },
    };

    format!("<a href=\"{}\">Private Chat</a>", escape_html(&link))
}

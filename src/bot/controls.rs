//! Playback controls: seek, skip, pause, resume, stop and queue

use super::commands::ParsedCommand;
use super::reply::{self, queue_listing};
use super::{run_engine, BotState, HandlerResult};
use crate::media::escape_html;
use crate::utils::parse_seek_position;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};

async fn respond(bot: &Bot, msg: &Message, text: impl Into<String>) -> HandlerResult {
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

pub async fn seek(bot: &Bot, msg: &Message, state: &BotState, parsed: &ParsedCommand) -> HandlerResult {
    let Some(arg) = parsed.args.first() else {
        return respond(bot, msg, reply::SEEK_USAGE).await;
    };

    let Ok(position) = parse_seek_position(arg) else {
        return respond(bot, msg, reply::SEEK_INVALID).await;
    };

    let chat = msg.chat.id;
    let outcome = run_engine(&state.engine, move |engine| engine.seek_stream(chat, position)).await;
    let text = match outcome {
        Ok(message) => message,
        Err(e) => e.user_message(),
    };
    respond(bot, msg, escape_html(&text)).await
}

pub async fn skip(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let chat = msg.chat.id;
    let outcome = run_engine(&state.engine, move |engine| engine.skip(chat)).await;
    let text = match outcome {
        Ok(Some(next)) => format!(
            "⏭ <b>Skipped.</b> Now streaming: {}",
            escape_html(&next.title)
        ),
        Ok(None) => "⏭ <b>Skipped.</b> Queue finished, leaving voice chat.".to_string(),
        Err(e) => escape_html(&e.user_message()),
    };
    respond(bot, msg, text).await
}

pub async fn pause(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let chat = msg.chat.id;
    let outcome = run_engine(&state.engine, move |engine| engine.pause(chat)).await;
    let text = match outcome {
        Ok(true) => "⏸ <b>Stream paused.</b>".to_string(),
        Ok(false) => "⏸ Stream is already paused.".to_string(),
        Err(e) => escape_html(&e.user_message()),
    };
    respond(bot, msg, text).await
}

pub async fn resume(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let chat = msg.chat.id;
    let outcome = run_engine(&state.engine, move |engine| engine.resume(chat)).await;
    let text = match outcome {
        Ok(true) => "▶️ <b>Stream resumed.</b>".to_string(),
        Ok(false) => "▶️ Stream is not paused.".to_string(),
        Err(e) => escape_html(&e.user_message()),
    };
    respond(bot, msg, text).await
}

pub async fn stop(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let chat = msg.chat.id;
    let outcome = run_engine(&state.engine, move |engine| engine.stop(chat)).await;
    let text = match outcome {
        Ok(()) => "⏹ <b>Stream ended and queue cleared.</b>".to_string(),
        Err(e) => escape_html(&e.user_message()),
    };
    respond(bot, msg, text).await
}

pub async fn queue(bot: &Bot, msg: &Message, state: &BotState) -> HandlerResult {
    let chat = msg.chat.id;
    let snapshot = run_engine(&state.engine, move |engine| {
        Ok((
            engine.queue().entries(chat),
            engine.played_secs(chat),
            engine.is_paused(chat),
        ))
    })
    .await;

    let text = match snapshot {
        Ok((entries, played, paused)) => queue_listing(&entries, played, paused),
        Err(e) => escape_html(&e.user_message()),
    };
    respond(bot, msg, text).await
}

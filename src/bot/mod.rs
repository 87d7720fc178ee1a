//! Telegram front end
//!
//! Group chat commands feed the `CallEngine`; engine events are posted back
//! by the notifier task.

pub mod admin;
pub mod commands;
pub mod controls;
pub mod notify;
pub mod play;
pub mod reply;

use crate::call::{CallEngine, RtmpBackend};
use crate::config::BotConfig;
use crate::source::{DownloadApi, YouTubeSearch};
use crate::thumb::load_font;
use crate::{Result, VcError};
use ab_glyph::FontVec;
use commands::{Command, ParsedCommand};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// State shared by all handlers
pub struct BotState {
    pub config: BotConfig,
    pub engine: CallEngine,
    pub search: YouTubeSearch,
    pub api: DownloadApi,
    pub http: reqwest::Client,
    pub font: Option<FontVec>,
    pub bot_username: String,
    /// Exported invite links of private chats
    chat_links: RwLock<HashMap<ChatId, String>>,
}

impl BotState {
    pub fn new(config: BotConfig, engine: CallEngine, bot_username: impl Into<String>) -> Result<Self> {
        let search = YouTubeSearch::new(&config.search)?;
        let api = DownloadApi::new(config.download.clone())?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.search.timeout_secs))
            .build()?;

        let font = match &config.thumbnail.font {
            Some(path) => match load_font(path) {
                Ok(font) => Some(font),
                Err(e) => {
                    warn!("Thumbnails will have no text: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(Self {
            config,
            engine,
            search,
            api,
            http,
            font,
            bot_username: bot_username.into(),
            chat_links: RwLock::new(HashMap::new()),
        })
    }

    pub fn log_chat(&self) -> Option<ChatId> {
        self.config.telegram.log_group_id.map(ChatId)
    }

    pub fn chat_link(&self, chat: ChatId) -> Option<String> {
        self.chat_links.read().get(&chat).cloned()
    }

    pub fn remember_chat_link(&self, chat: ChatId, link: String) {
        self.chat_links.write().insert(chat, link);
    }
}

/// Run a `CallEngine` operation on the blocking pool. Engine calls take the
/// engine lock and spawn, kill and reap ffmpeg children.
pub async fn run_engine<T, F>(engine: &CallEngine, op: F) -> Result<T>
where
    F: FnOnce(&CallEngine) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || op(&engine))
        .await
        .map_err(|e| VcError::Stream(format!("engine task failed: {}", e)))?
}

pub fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync + 'static>> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback))
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> HandlerResult {
    if msg.chat.is_private() {
        return Ok(());
    }

    let Some(text) = msg.text() else {
        return Ok(());
    };
    let Some(parsed) =
        ParsedCommand::parse(text, &state.config.commands.prefixes, &state.bot_username)
    else {
        return Ok(());
    };

    debug!("Command {:?} in {} with {:?}", parsed.command, msg.chat.id, parsed.args);

    if parsed.command.is_admin_only()
        && !admin::is_admin(&bot, &msg, &state.config.telegram.sudo_users).await
    {
        bot.send_message(msg.chat.id, reply::ADMIN_ONLY).await?;
        return Ok(());
    }

    match parsed.command {
        Command::Play | Command::VPlay => play::play(&bot, &msg, &state, &parsed).await,
        Command::Seek => controls::seek(&bot, &msg, &state, &parsed).await,
        Command::Skip => controls::skip(&bot, &msg, &state).await,
        Command::Pause => controls::pause(&bot, &msg, &state).await,
        Command::Resume => controls::resume(&bot, &msg, &state).await,
        Command::Stop => controls::stop(&bot, &msg, &state).await,
        Command::Queue => controls::queue(&bot, &msg, &state).await,
    }
}

async fn handle_callback(bot: Bot, query: CallbackQuery) -> HandlerResult {
    if query.data.as_deref() == Some(reply::CLOSE_CALLBACK) {
        if let Some(message) = &query.message {
            if let Err(e) = bot.delete_message(message.chat().id, message.id()).await {
                debug!("Failed to close message: {}", e);
            }
        }
    }

    bot.answer_callback_query(query.id.clone()).await?;
    Ok(())
}

fn build_bot(config: &BotConfig) -> Result<Bot> {
    let bot = Bot::new(&config.telegram.token);
    match &config.telegram.api_url {
        Some(api_url) => {
            let url = url::Url::parse(api_url)
                .map_err(|e| VcError::Config(format!("invalid api_url {}: {}", api_url, e)))?;
            Ok(bot.set_api_url(url))
        }
        None => Ok(bot),
    }
}

/// Run the bot until Ctrl-C
pub async fn run(config: BotConfig) -> Result<()> {
    let bot = build_bot(&config)?;
    let me = bot.get_me().await?;
    let username = me.username().to_string();
    info!("Logged in as @{}", username);

    let backend = Arc::new(RtmpBackend::new(config.stream.clone()));
    let engine = CallEngine::new(backend);
    let monitor = engine.start_monitor(Duration::from_millis(config.stream.poll_interval_ms));

    let notifier = tokio::spawn(notify::run(
        bot.clone(),
        engine.event_receiver(),
        username.clone(),
    ));

    let state = Arc::new(BotState::new(config, engine, username)?);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Shutting down");
    notifier.abort();
    if let Err(e) = tokio::task::spawn_blocking(move || monitor.shutdown()).await {
        error!("Stream monitor did not stop cleanly: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{StreamBackend, StreamStatus};
    use crate::media::{MediaStream, QueueEntry, Requester, StreamKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend whose start takes as long as a slow ffmpeg launch
    struct SlowBackend;

    impl StreamBackend for SlowBackend {
        fn start(&self, _: ChatId, _: &MediaStream, _: u64) -> Result<()> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        }
        fn stop(&self, _: ChatId) -> Result<()> {
            Ok(())
        }
        fn status(&self, _: ChatId) -> StreamStatus {
            StreamStatus::Running
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_engine_calls_leave_runtime_free() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
        let entry = QueueEntry::new(stream, "slow", 60, Requester::anonymous());
        let engine = CallEngine::new(Arc::new(SlowBackend));

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let chat = ChatId(-1);
        let position = run_engine(&engine, move |engine| engine.play(chat, entry))
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(position, 0);
        assert!(ticks.load(Ordering::SeqCst) >= 3, "runtime was blocked");
        assert!(engine.queue().contains(chat));
    }

    #[tokio::test]
    async fn test_engine_errors_pass_through() {
        let engine = CallEngine::new(Arc::new(SlowBackend));
        let err = run_engine(&engine, |engine| engine.skip(ChatId(-1)))
            .await
            .unwrap_err();
        assert!(matches!(err, VcError::NotStreaming));
    }
}

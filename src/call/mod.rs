//! Voice chat streaming
//!
//! `StreamBackend` is the transport that actually puts media on air in a
//! chat. `CallEngine` owns the per-chat queues on top of it and advances
//! them when a stream ends.

pub mod engine;
pub mod ffmpeg;

pub use engine::{CallEngine, MonitorHandle};
pub use ffmpeg::RtmpBackend;

use crate::media::{MediaStream, QueueEntry};
use crate::{Result, VcError};
use teloxide::types::ChatId;

/// Transport that plays one stream per chat
pub trait StreamBackend: Send + Sync {
    /// Start (or restart) the chat's stream at `offset_secs`, replacing any running one
    fn start(&self, chat: ChatId, stream: &MediaStream, offset_secs: u64) -> Result<()>;

    /// Stop the chat's stream. Stopping an idle chat is a no-op.
    fn stop(&self, chat: ChatId) -> Result<()>;

    /// State of the chat's stream. `Ended` and `Failed` are reported once.
    fn status(&self, chat: ChatId) -> StreamStatus;
}

/// Outcome of polling a chat's stream
#[derive(Debug)]
pub enum StreamStatus {
    /// Still on air, or nothing was started
    Running,

    /// Ran to the end of the track
    Ended,

    /// The transport died before the track ended
    Failed(VcError),
}

/// Events emitted by the engine's monitor
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The previous track ended and this one is now on air
    NowPlaying { chat: ChatId, entry: QueueEntry },

    /// The last track ended; the chat has no queue any more
    QueueFinished { chat: ChatId },

    /// The current track failed on air, or a queued track could not be
    /// started; either way it was dropped
    Error { chat: ChatId, error: String },
}

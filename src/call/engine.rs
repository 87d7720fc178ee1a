//! Queue-backed streaming engine
//!
//! Connects the per-chat queues to a `StreamBackend`: starts the first
//! track, appends the rest, seeks, pauses, skips, and advances the queue
//! when the monitor sees a stream end. A track whose stream dies, or
//! cannot be restarted by a seek or resume, is dropped so the chat never
//! stays wedged on it.

use super::{CallEvent, StreamBackend, StreamStatus};
use crate::media::{ChatQueue, MediaStream, QueueEntry};
use crate::utils::time::seconds_to_hhmmss;
use crate::{Result, VcError};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use teloxide::types::ChatId;
use tracing::{debug, info, warn};

/// Tracks how far into the current track a chat is
#[derive(Debug, Clone, Copy)]
struct PlaybackClock {
    offset_secs: u64,
    /// `None` while paused
    started: Option<Instant>,
}

impl PlaybackClock {
    fn running(offset_secs: u64) -> Self {
        Self {
            offset_secs,
            started: Some(Instant::now()),
        }
    }

    fn paused(offset_secs: u64) -> Self {
        Self {
            offset_secs,
            started: None,
        }
    }

    fn position(&self) -> u64 {
        self.offset_secs + self.started.map_or(0, |t| t.elapsed().as_secs())
    }

    fn is_paused(&self) -> bool {
        self.started.is_none()
    }
}

#[derive(Clone)]
pub struct CallEngine {
    backend: Arc<dyn StreamBackend>,
    queue: ChatQueue,
    clocks: Arc<Mutex<HashMap<ChatId, PlaybackClock>>>,

    /// Serialises queue + backend transitions so two commands cannot both
    /// start the first track of a chat
    ops: Arc<Mutex<()>>,

    event_tx: Sender<CallEvent>,
    event_rx: Receiver<CallEvent>,
}

impl CallEngine {
    pub fn new(backend: Arc<dyn StreamBackend>) -> Self {
        let (event_tx, event_rx) = bounded(100);

        Self {
            backend,
            queue: ChatQueue::new(),
            clocks: Arc::new(Mutex::new(HashMap::new())),
            ops: Arc::new(Mutex::new(())),
            event_tx,
            event_rx,
        }
    }

    /// Read access to the queues
    pub fn queue(&self) -> &ChatQueue {
        &self.queue
    }

    /// Get a receiver for monitor events
    pub fn event_receiver(&self) -> Receiver<CallEvent> {
        self.event_rx.clone()
    }

    /// Put a stream on air from its beginning
    pub fn start_stream(&self, chat: ChatId, stream: &MediaStream) -> Result<()> {
        self.backend.start(chat, stream, 0)?;
        self.clocks.lock().insert(chat, PlaybackClock::running(0));
        Ok(())
    }

    /// Append an entry without touching the backend
    pub fn add_to_queue(&self, chat: ChatId, entry: QueueEntry) -> usize {
        self.queue.push(chat, entry)
    }

    /// Queue an entry, starting it right away if the chat is idle.
    ///
    /// Returns the entry's position; 0 means it is now playing. If the
    /// stream cannot be started nothing is queued.
    pub fn play(&self, chat: ChatId, entry: QueueEntry) -> Result<usize> {
        let _guard = self.ops.lock();

        if !self.queue.contains(chat) {
            self.start_stream(chat, &entry.media_stream)?;
            info!("Started streaming '{}' in chat {}", entry.title, chat);
        }

        let position = self.add_to_queue(chat, entry);
        debug!("Chat {} queue position {}", chat, position);
        Ok(position)
    }

    /// Jump to `position_secs` in the current track
    pub fn seek_stream(&self, chat: ChatId, position_secs: u64) -> Result<String> {
        let _guard = self.ops.lock();

        let current = self.queue.current(chat).ok_or(VcError::NotStreaming)?;

        if current.duration_secs > 0 && position_secs >= current.duration_secs {
            return Err(VcError::Seek(format!(
                "Seek position {} is beyond the track length {}.",
                seconds_to_hhmmss(position_secs),
                seconds_to_hhmmss(current.duration_secs)
            )));
        }

        let paused = self.is_paused(chat);
        if paused {
            self.clocks
                .lock()
                .insert(chat, PlaybackClock::paused(position_secs));
        } else {
            if let Err(e) = self
                .backend
                .start(chat, &current.media_stream, position_secs)
            {
                warn!("Failed to restart '{}' in chat {}: {}", current.title, chat, e);
                self.move_on_locked(chat);
                return Err(e);
            }
            self.clocks
                .lock()
                .insert(chat, PlaybackClock::running(position_secs));
        }

        let total = if current.duration_secs > 0 {
            seconds_to_hhmmss(current.duration_secs)
        } else {
            "Unknown".to_string()
        };

        info!("Seeked chat {} to {}s", chat, position_secs);
        Ok(format!(
            "⏩ Seeked to {} / {}",
            seconds_to_hhmmss(position_secs),
            total
        ))
    }

    /// Drop the current track and start the next one, if any
    pub fn skip(&self, chat: ChatId) -> Result<Option<QueueEntry>> {
        let _guard = self.ops.lock();

        if !self.queue.contains(chat) {
            return Err(VcError::NotStreaming);
        }

        self.backend.stop(chat)?;
        let next = self.advance_locked(chat);
        if next.is_none() {
            info!("Queue for chat {} finished after skip", chat);
        }
        Ok(next)
    }

    /// Stop streaming and forget the chat's queue
    pub fn stop(&self, chat: ChatId) -> Result<()> {
        let _guard = self.ops.lock();

        if !self.queue.contains(chat) {
            return Err(VcError::NotStreaming);
        }

        self.backend.stop(chat)?;
        let dropped = self.queue.clear(chat);
        self.clocks.lock().remove(&chat);
        info!("Stopped chat {} and dropped {} queued tracks", chat, dropped.len());
        Ok(())
    }

    /// Pause the current track. Returns `false` if it was already paused.
    pub fn pause(&self, chat: ChatId) -> Result<bool> {
        let _guard = self.ops.lock();

        if !self.queue.contains(chat) {
            return Err(VcError::NotStreaming);
        }

        let mut clocks = self.clocks.lock();
        let clock = clocks
            .entry(chat)
            .or_insert_with(|| PlaybackClock::running(0));
        if clock.is_paused() {
            return Ok(false);
        }

        self.backend.stop(chat)?;
        *clock = PlaybackClock::paused(clock.position());
        info!("Paused chat {} at {}s", chat, clock.offset_secs);
        Ok(true)
    }

    /// Resume a paused track. Returns `false` if it was not paused.
    pub fn resume(&self, chat: ChatId) -> Result<bool> {
        let _guard = self.ops.lock();

        let current = self.queue.current(chat).ok_or(VcError::NotStreaming)?;
        let offset = match self.clocks.lock().get(&chat) {
            Some(clock) if clock.is_paused() => clock.offset_secs,
            _ => return Ok(false),
        };

        if let Err(e) = self.backend.start(chat, &current.media_stream, offset) {
            warn!("Failed to resume '{}' in chat {}: {}", current.title, chat, e);
            self.move_on_locked(chat);
            return Err(e);
        }
        self.clocks.lock().insert(chat, PlaybackClock::running(offset));
        info!("Resumed chat {} at {}s", chat, offset);
        Ok(true)
    }

    /// Seconds played of the current track
    pub fn played_secs(&self, chat: ChatId) -> Option<u64> {
        self.clocks.lock().get(&chat).map(PlaybackClock::position)
    }

    pub fn is_paused(&self, chat: ChatId) -> bool {
        self.clocks
            .lock()
            .get(&chat)
            .is_some_and(PlaybackClock::is_paused)
    }

    /// Check every playing chat once and advance the ones whose stream ended.
    ///
    /// Returns the number of chats that changed track or finished.
    pub fn poll_finished(&self) -> usize {
        let mut advanced = 0;

        for chat in self.queue.active_chats() {
            if self.is_paused(chat) {
                continue;
            }

            let _guard = self.ops.lock();
            // A command may have skipped or stopped the chat meanwhile
            if !self.queue.contains(chat) || self.is_paused(chat) {
                continue;
            }
            let failure = match self.backend.status(chat) {
                StreamStatus::Running => continue,
                StreamStatus::Ended => None,
                StreamStatus::Failed(e) => Some(e),
            };

            advanced += 1;
            if let Some(e) = failure {
                warn!("Dropping failed stream in chat {}: {}", chat, e);
                self.emit(CallEvent::Error {
                    chat,
                    error: e.user_message(),
                });
            }
            self.move_on_locked(chat);
        }

        advanced
    }

    /// Spawn a thread that calls `poll_finished` every `interval`
    pub fn start_monitor(&self, interval: Duration) -> MonitorHandle {
        let engine = self.clone();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::spawn(move || {
            info!("Stream monitor started");
            while flag.load(Ordering::SeqCst) {
                engine.poll_finished();
                thread::sleep(interval);
            }
            info!("Stream monitor stopped");
        });

        MonitorHandle {
            running,
            handle: Some(handle),
        }
    }

    /// Advance past the current track and announce the outcome. Caller
    /// holds `ops`.
    fn move_on_locked(&self, chat: ChatId) {
        match self.advance_locked(chat) {
            Some(entry) => {
                info!("Now streaming '{}' in chat {}", entry.title, chat);
                self.emit(CallEvent::NowPlaying { chat, entry });
            }
            None => {
                info!("Queue for chat {} finished", chat);
                if let Err(e) = self.backend.stop(chat) {
                    warn!("Failed to stop finished stream in chat {}: {}", chat, e);
                }
                self.emit(CallEvent::QueueFinished { chat });
            }
        }
    }

    /// Move to the next playable entry. Entries that fail to start are
    /// dropped and reported. Caller holds `ops`.
    fn advance_locked(&self, chat: ChatId) -> Option<QueueEntry> {
        loop {
            let Some(next) = self.queue.advance(chat) else {
                self.clocks.lock().remove(&chat);
                return None;
            };

            match self.start_stream(chat, &next.media_stream) {
                Ok(()) => return Some(next),
                Err(e) => {
                    warn!("Failed to start '{}' in chat {}: {}", next.title, chat, e);
                    self.emit(CallEvent::Error {
                        chat,
                        error: e.user_message(),
                    });
                }
            }
        }
    }

    fn emit(&self, event: CallEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Call event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Stops the monitor thread on `shutdown`
pub struct MonitorHandle {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Stream monitor thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Requester, StreamKind};

    /// Backend that accepts everything and never finishes
    struct NullBackend;

    impl StreamBackend for NullBackend {
        fn start(&self, _: ChatId, _: &MediaStream, _: u64) -> Result<()> {
            Ok(())
        }
        fn stop(&self, _: ChatId) -> Result<()> {
            Ok(())
        }
        fn status(&self, _: ChatId) -> StreamStatus {
            StreamStatus::Running
        }
    }

    fn entry(file: &tempfile::NamedTempFile, secs: u64) -> QueueEntry {
        let stream = MediaStream::new(file.path(), StreamKind::Audio).unwrap();
        QueueEntry::new(stream, "track", secs, Requester::anonymous())
    }

    #[test]
    fn test_clock() {
        let clock = PlaybackClock::paused(42);
        assert!(clock.is_paused());
        assert_eq!(clock.position(), 42);
        assert!(!PlaybackClock::running(0).is_paused());
    }

    #[test]
    fn test_seek_bounds() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let engine = CallEngine::new(Arc::new(NullBackend));
        let chat = ChatId(-1);

        assert!(matches!(engine.seek_stream(chat, 10), Err(VcError::NotStreaming)));

        engine.play(chat, entry(&file, 120)).unwrap();
        assert!(matches!(engine.seek_stream(chat, 120), Err(VcError::Seek(_))));
        assert_eq!(engine.seek_stream(chat, 90).unwrap(), "⏩ Seeked to 01:30 / 02:00");
        assert!(engine.played_secs(chat).unwrap() >= 90);
    }

    #[test]
    fn test_seek_unknown_duration() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let engine = CallEngine::new(Arc::new(NullBackend));
        let chat = ChatId(-1);

        engine.play(chat, entry(&file, 0)).unwrap();
        assert_eq!(
            engine.seek_stream(chat, 4_000).unwrap(),
            "⏩ Seeked to 1:06:40 / Unknown"
        );
    }

    #[test]
    fn test_pause_resume_toggles() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let engine = CallEngine::new(Arc::new(NullBackend));
        let chat = ChatId(-1);

        engine.play(chat, entry(&file, 60)).unwrap();
        assert!(!engine.resume(chat).unwrap());
        assert!(engine.pause(chat).unwrap());
        assert!(engine.is_paused(chat));
        assert!(!engine.pause(chat).unwrap());
        assert!(engine.resume(chat).unwrap());
        assert!(!engine.is_paused(chat));
    }

    #[test]
    fn test_monitor_shutdown() {
        let engine = CallEngine::new(Arc::new(NullBackend));
        let monitor = engine.start_monitor(Duration::from_millis(5));
        assert!(monitor.is_running());
        monitor.shutdown();
    }
}

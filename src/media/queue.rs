use super::types::QueueEntry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use teloxide::types::ChatId;
use uuid::Uuid;

/// Per-chat play queues. Index 0 of a chat's list is the track on air.
///
/// A chat key only exists while its list is non-empty, so `contains` doubles
/// as "is something playing in this chat".
#[derive(Debug, Clone)]
pub struct ChatQueue {
    queues: Arc<RwLock<HashMap<ChatId, Vec<QueueEntry>>>>,
}

impl ChatQueue {
    pub fn new() -> Self {
        Self {
            queues: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Append an entry and return its position (0 = now playing)
    pub fn push(&self, chat: ChatId, entry: QueueEntry) -> usize {
        let mut queues = self.queues.write();
        let list = queues.entry(chat).or_default();
        list.push(entry);
        list.len() - 1
    }

    pub fn current(&self, chat: ChatId) -> Option<QueueEntry> {
        self.queues
            .read()
            .get(&chat)
            .and_then(|list| list.first().cloned())
    }

    /// Drop the current entry and return the one that takes its place
    pub fn advance(&self, chat: ChatId) -> Option<QueueEntry> {
        let mut queues = self.queues.write();
        let list = queues.get_mut(&chat)?;
        if !list.is_empty() {
            list.remove(0);
        }
        match list.first().cloned() {
            Some(next) => Some(next),
            None => {
                queues.remove(&chat);
                None
            }
        }
    }

    pub fn contains(&self, chat: ChatId) -> bool {
        self.queues.read().contains_key(&chat)
    }

    pub fn len(&self, chat: ChatId) -> usize {
        self.queues.read().get(&chat).map_or(0, Vec::len)
    }

    pub fn entries(&self, chat: ChatId) -> Vec<QueueEntry> {
        self.queues.read().get(&chat).cloned().unwrap_or_default()
    }

    /// Remove every entry for a chat, returning what was queued
    pub fn clear(&self, chat: ChatId) -> Vec<QueueEntry> {
        self.queues.write().remove(&chat).unwrap_or_default()
    }

    /// Point a queued entry at a new thumbnail. Returns `false` if the entry
    /// already left the queue.
    pub fn set_thumbnail(&self, chat: ChatId, id: Uuid, thumbnail: &Path) -> bool {
        let mut queues = self.queues.write();
        let Some(entry) = queues
            .get_mut(&chat)
            .and_then(|list| list.iter_mut().find(|e| e.id == id))
        else {
            return false;
        };
        entry.thumbnail = thumbnail.to_path_buf();
        true
    }

    pub fn active_chats(&self) -> Vec<ChatId> {
        self.queues.read().keys().copied().collect()
    }
}

impl Default for ChatQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub mod queue;
pub mod types;

pub use queue::ChatQueue;
pub use types::{
    escape_html, AudioQuality, MediaStream, QueueEntry, Requester, StreamKind, VideoQuality,
};

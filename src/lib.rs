pub mod bot;
pub mod call;
pub mod config;
pub mod media;
pub mod source;
pub mod thumb;
pub mod utils;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum VcError {
    #[error("No active voice chat: {0}")]
    NoActiveCall(String),

    #[error("Telegram server error: {0}")]
    TelegramServer(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Media stream error: {0}")]
    MediaStream(String),

    #[error("Nothing is streaming")]
    NotStreaming,

    #[error("Seek error: {0}")]
    Seek(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Download error: {0}")]
    Download(String),

    #[error("Thumbnail error: {0}")]
    Thumbnail(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    #[error("IO error: {0}")]
    IO(String),
}

impl From<std::io::Error> for VcError {
    fn from(e: std::io::Error) -> Self {
        VcError::IO(e.to_string())
    }
}

impl From<teloxide::RequestError> for VcError {
    fn from(e: teloxide::RequestError) -> Self {
        VcError::Telegram(e.to_string())
    }
}

impl From<reqwest::Error> for VcError {
    fn from(e: reqwest::Error) -> Self {
        VcError::Download(e.to_string())
    }
}

impl VcError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // The chat has to start a voice chat first
            VcError::NoActiveCall(_) => false,
            // These are typically transient errors
            VcError::TelegramServer(_) => true,
            VcError::Stream(_) => true,
            VcError::MediaStream(_) => false,
            VcError::NotStreaming => false,
            VcError::Seek(_) => false,
            VcError::Search(_) => true,
            VcError::Download(_) => true,
            VcError::Thumbnail(_) => true,
            VcError::Telegram(_) => true,
            VcError::Config(_) => false,
            VcError::IO(_) => false,
        }
    }

    /// Get the chat-facing description
    pub fn user_message(&self) -> String {
        match self {
            VcError::NoActiveCall(_) => {
                "❌ No active voice chat found. Please join a voice chat first.".to_string()
            }
            VcError::TelegramServer(_) => {
                "⚠️ Telegram server error! Please try again shortly.".to_string()
            }
            VcError::Stream(e) => format!("❌ Failed to stream: {}", e),
            VcError::MediaStream(e) => format!("❌ Failed to create media stream: {}", e),
            VcError::Download(e) => format!("❌ Failed to download: {}", e),
            VcError::NotStreaming => "❌ Nothing is streaming right now.".to_string(),
            VcError::Seek(e) => format!("❌ {}", e),
            VcError::Search(e)
            | VcError::Thumbnail(e)
            | VcError::Config(e)
            | VcError::Telegram(e)
            | VcError::IO(e) => format!("❌ An error occurred: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, VcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let err = VcError::NoActiveCall("no endpoint".into());
        assert!(err.user_message().starts_with("❌ No active voice chat"));
        assert!(!err.is_recoverable());

        let err = VcError::Stream("ffmpeg exited".into());
        assert_eq!(err.user_message(), "❌ Failed to stream: ffmpeg exited");
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VcError = io.into();
        assert!(matches!(err, VcError::IO(_)));
    }
}

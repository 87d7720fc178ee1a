//! Bot configuration
//!
//! Loaded from a TOML file; every section falls back to its defaults so a
//! minimal file only needs the bot token and the stream endpoints.

use crate::{Result, VcError};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;

/// Environment variable consulted when `telegram.token` is empty
pub const TOKEN_ENV: &str = "BOT_TOKEN";

/// Complete bot configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub commands: CommandConfig,
    pub download: DownloadConfig,
    pub search: SearchConfig,
    pub thumbnail: ThumbnailConfig,
    pub stream: StreamConfig,
}

/// Bot API access and privileged users
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    pub token: String,

    /// Custom Bot API server (lifts the 20 MB download limit)
    pub api_url: Option<String>,

    /// Chat that receives play logs and relays linked files
    pub log_group_id: Option<i64>,

    /// Users allowed to run admin-only commands in any chat
    pub sudo_users: Vec<u64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Accepted command prefixes
    pub prefixes: Vec<String>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["/".to_string(), "!".to_string(), ".".to_string()],
        }
    }
}

/// Download API and local media cache
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub api_url: String,
    pub api_key: String,

    /// Directory holding downloaded media
    pub dir: PathBuf,

    /// Timeout for the download API request
    pub api_timeout_secs: u64,

    /// Timeout for a direct media download
    pub download_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            api_url: "https://bitflow.in/api/youtube".to_string(),
            api_key: String::new(),
            dir: PathBuf::from("downloads"),
            api_timeout_secs: 150,
            download_timeout_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Directory for prepared covers and rendered cards
    pub cache_dir: PathBuf,

    /// Cover used when a thumbnail cannot be fetched
    pub fallback: PathBuf,

    /// TrueType font for card text; text is skipped without it
    pub font: Option<PathBuf>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            fallback: PathBuf::from("resource/thumbnail.png"),
            font: Some(PathBuf::from("resource/font.ttf")),
        }
    }
}

/// Stream transport settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// ffmpeg binary
    pub ffmpeg: String,

    pub audio_bitrate: String,
    pub video_bitrate: String,

    /// Monitor poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// How long a fresh ffmpeg must stay up before a start counts as
    /// successful, in milliseconds
    pub start_grace_ms: u64,

    /// RTMP ingest URL per chat id
    pub endpoints: HashMap<String, String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            audio_bitrate: "192k".to_string(),
            video_bitrate: "2500k".to_string(),
            poll_interval_ms: 500,
            start_grace_ms: 1500,
            endpoints: HashMap::new(),
        }
    }
}

impl StreamConfig {
    /// Ingest URL configured for a chat
    pub fn endpoint(&self, chat: ChatId) -> Option<&str> {
        self.endpoints.get(&chat.0.to_string()).map(String::as_str)
    }
}

impl BotConfig {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            VcError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| VcError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: BotConfig =
            toml::from_str(content).map_err(|e| VcError::Config(e.to_string()))?;

        if config.telegram.token.trim().is_empty() {
            if let Ok(token) = std::env::var(TOKEN_ENV) {
                config.telegram.token = token;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the bot token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.telegram.token = token.into();
        self
    }

    /// Add an RTMP ingest endpoint for a chat
    pub fn with_endpoint(mut self, chat: ChatId, url: impl Into<String>) -> Self {
        self.stream.endpoints.insert(chat.0.to_string(), url.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(VcError::Config(format!(
                "Bot token is required (telegram.token or {})",
                TOKEN_ENV
            )));
        }

        if self.commands.prefixes.is_empty() {
            return Err(VcError::Config("At least one command prefix is required".into()));
        }
        if self.commands.prefixes.iter().any(|p| p.is_empty()) {
            return Err(VcError::Config("Command prefixes must not be empty".into()));
        }

        if self.download.api_timeout_secs == 0
            || self.download.download_timeout_secs == 0
            || self.search.timeout_secs == 0
        {
            return Err(VcError::Config("Timeouts must be greater than zero".into()));
        }

        if self.stream.poll_interval_ms == 0 {
            return Err(VcError::Config("stream.poll_interval_ms must be greater than zero".into()));
        }

        for key in self.stream.endpoints.keys() {
            if key.parse::<i64>().is_err() {
                return Err(VcError::Config(format!(
                    "Stream endpoint key is not a chat id: {}",
                    key
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BotConfig::default();
        assert_eq!(config.commands.prefixes, vec!["/", "!", "."]);
        assert_eq!(config.download.api_timeout_secs, 150);
        assert_eq!(config.download.download_timeout_secs, 300);
        assert!(config.validate().is_err(), "token is required");
    }

    #[test]
    fn test_parse_minimal() {
        let config = BotConfig::from_toml(
            r#"
            [telegram]
            token = "123:abc"
            log_group_id = -1001

            [stream.endpoints]
            "-100200" = "rtmps://dc4-1.rtmp.t.me/s/key"
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.log_group_id, Some(-1001));
        assert_eq!(
            config.stream.endpoint(ChatId(-100200)),
            Some("rtmps://dc4-1.rtmp.t.me/s/key")
        );
        assert_eq!(config.stream.endpoint(ChatId(-1)), None);
        assert_eq!(config.thumbnail.cache_dir, PathBuf::from("cache"));
    }

    #[test]
    fn test_rejects_bad_endpoint_key() {
        let config = BotConfig::default()
            .with_token("t")
            .with_endpoint(ChatId(5), "rtmp://x");
        assert!(config.validate().is_ok());

        let mut config = config;
        config
            .stream
            .endpoints
            .insert("general".to_string(), "rtmp://y".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_prefix() {
        let mut config = BotConfig::default().with_token("t");
        config.commands.prefixes = vec![String::new()];
        assert!(config.validate().is_err());
    }
}

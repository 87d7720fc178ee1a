//! Where tracks come from: YouTube search, the download API, and Telegram media

pub mod fetch;
pub mod query;
pub mod search;
pub mod telegram;

pub use fetch::{cached_path, resolve_download, DownloadApi, DownloadSource};
pub use query::{parse_query, parse_tg_link};
pub use search::{SearchResult, YouTubeSearch};
pub use telegram::{fetch_linked_file, TelegramMedia};

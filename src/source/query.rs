//! Normalising user queries and download links

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

fn youtube_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(https?://)?(www\.|m\.|music\.)?(youtube\.com|youtu\.be)/(?:watch\?v=|embed/|v/|shorts/|live/)?([A-Za-z0-9_-]{11})(?:[?&].*)?$",
        )
        .expect("valid regex")
    })
}

fn youtube_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:v=|/(?:embed|v|shorts|live)/|youtu\.be/)([A-Za-z0-9_-]{11})")
            .expect("valid regex")
    })
}

/// Canonicalise YouTube links to `watch?v=` form; other text passes through
pub fn parse_query(query: &str) -> String {
    let query = query.trim();
    if youtube_url().is_match(query) {
        if let Some(id) = youtube_id().captures(query).and_then(|c| c.get(1)) {
            return format!("https://www.youtube.com/watch?v={}", id.as_str());
        }
    }
    query.to_string()
}

/// Split a `t.me/<channel>/<message id>` link
pub fn parse_tg_link(link: &str) -> Option<(String, i32)> {
    let parsed = Url::parse(link)
        .or_else(|_| Url::parse(&format!("https://{}", link)))
        .ok()?;

    let mut parts = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty());
    let channel = parts.next()?;
    let message_id = parts.next()?.parse().ok()?;

    Some((channel.to_string(), message_id))
}

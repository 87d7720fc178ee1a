//! YouTube video search
//!
//! Fetches the public results page and reads the `ytInitialData` JSON
//! embedded in it, the same data the web client renders from.

use crate::config::SearchConfig;
use crate::{Result, VcError};
use regex::Regex;
use reqwest::Client;
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// Results filter for "videos only"
const VIDEO_FILTER: &str = "EgIQAQ==";

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// One video from a search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    /// `None` for live streams
    pub duration: Option<String>,
    pub views: String,
    pub thumbnail: String,
    pub channel_name: String,
    pub channel_link: String,
    pub link: String,
}

pub struct YouTubeSearch {
    client: Client,
    base_url: String,
}

impl YouTubeSearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| VcError::Search(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// First video matching `query`
    pub async fn search(&self, query: &str) -> Result<Option<SearchResult>> {
        let url = format!("{}/results", self.base_url);
        let html = self
            .client
            .get(&url)
            .query(&[("search_query", query), ("sp", VIDEO_FILTER)])
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VcError::Search(e.to_string()))?
            .text()
            .await
            .map_err(|e| VcError::Search(e.to_string()))?;

        let results = parse_results(&html)?;
        debug!("Search '{}' returned {} videos", query, results.len());
        Ok(results.into_iter().next())
    }
}

fn initial_data() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)ytInitialData"?\]?\s*=\s*(\{.*?\});\s*</script>"#).expect("valid regex")
    })
}

/// Extract every video from a results page, in page order
pub fn parse_results(html: &str) -> Result<Vec<SearchResult>> {
    let json = initial_data()
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| VcError::Search("ytInitialData not found in results page".into()))?;

    let data: Value = serde_json::from_str(json.as_str())
        .map_err(|e| VcError::Search(format!("Malformed ytInitialData: {}", e)))?;

    let mut renderers = Vec::new();
    collect_video_renderers(&data, &mut renderers);

    Ok(renderers.into_iter().filter_map(parse_video).collect())
}

fn collect_video_renderers<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "videoRenderer" {
                    out.push(child);
                } else {
                    collect_video_renderers(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_video_renderers(item, out);
            }
        }
        _ => {}
    }
}

/// `simpleText` or the concatenated `runs`
fn text_of(value: &Value) -> Option<String> {
    if let Some(text) = value.get("simpleText").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let runs = value.get("runs")?.as_array()?;
    let text: String = runs
        .iter()
        .filter_map(|run| run.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

fn parse_video(renderer: &Value) -> Option<SearchResult> {
    let id = renderer.get("videoId")?.as_str()?.to_string();
    let title = renderer.get("title").and_then(text_of)?;

    let duration = renderer.get("lengthText").and_then(text_of);
    let views = renderer
        .get("shortViewCountText")
        .or_else(|| renderer.get("viewCountText"))
        .and_then(text_of)
        .unwrap_or_default();

    let thumbnail = renderer
        .pointer("/thumbnail/thumbnails/0/url")
        .and_then(Value::as_str)
        .map(|url| url.split('?').next().unwrap_or(url).to_string())
        .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id));

    let owner = renderer
        .get("ownerText")
        .or_else(|| renderer.get("longBylineText"));
    let channel_name = owner.and_then(text_of).unwrap_or_default();
    let channel_link = owner
        .and_then(|o| {
            o.pointer("/runs/0/navigationEndpoint/browseEndpoint/canonicalBaseUrl")
                .or_else(|| {
                    o.pointer("/runs/0/navigationEndpoint/commandMetadata/webCommandMetadata/url")
                })
        })
        .and_then(Value::as_str)
        .map(|path| format!("https://www.youtube.com{}", path))
        .unwrap_or_default();

    Some(SearchResult {
        link: format!("https://www.youtube.com/watch?v={}", id),
        id,
        title,
        duration,
        views,
        thumbnail,
        channel_name,
        channel_link,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><script nonce="x">var ytInitialData = {"contents":{"twoColumnSearchResultsRenderer":{"primaryContents":{"sectionListRenderer":{"contents":[{"itemSectionRenderer":{"contents":[
        {"adSlotRenderer":{}},
        {"videoRenderer":{"videoId":"dQw4w9WgXcQ","title":{"runs":[{"text":"Never Gonna Give You Up"}]},
         "lengthText":{"simpleText":"3:33"},"shortViewCountText":{"simpleText":"1.5B views"},
         "thumbnail":{"thumbnails":[{"url":"https://i.ytimg.com/vi/dQw4w9WgXcQ/hq720.jpg?sqp=abc","width":720}]},
         "ownerText":{"runs":[{"text":"Rick Astley","navigationEndpoint":{"browseEndpoint":{"canonicalBaseUrl":"/@RickAstleyYT"}}}]}}},
        {"videoRenderer":{"videoId":"live0000000","title":{"runs":[{"text":"Lofi "},{"text":"radio"}]},
         "viewCountText":{"runs":[{"text":"12K watching"}]},
         "ownerText":{"runs":[{"text":"Lofi Girl"}]}}}
    ]}}]}}}}};</script></html>"#;

    #[test]
    fn test_parse_results() {
        let results = parse_results(PAGE).unwrap();
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.id, "dQw4w9WgXcQ");
        assert_eq!(first.title, "Never Gonna Give You Up");
        assert_eq!(first.duration.as_deref(), Some("3:33"));
        assert_eq!(first.views, "1.5B views");
        assert_eq!(first.thumbnail, "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq720.jpg");
        assert_eq!(first.channel_link, "https://www.youtube.com/@RickAstleyYT");
        assert_eq!(first.link, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert!(first.duration.is_some());
    }

    #[test]
    fn test_live_result() {
        let results = parse_results(PAGE).unwrap();
        let live = &results[1];
        assert_eq!(live.duration, None);
        assert_eq!(live.title, "Lofi radio");
        assert_eq!(live.views, "12K watching");
        assert_eq!(live.thumbnail, "https://i.ytimg.com/vi/live0000000/hqdefault.jpg");
        assert_eq!(live.channel_link, "");
    }

    #[test]
    fn test_missing_initial_data() {
        assert!(matches!(
            parse_results("<html></html>"),
            Err(VcError::Search(_))
        ));
    }
}

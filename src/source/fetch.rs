//! Download API client and direct media downloads

use crate::config::DownloadConfig;
use crate::media::StreamKind;
use crate::{Result, VcError};
use futures::StreamExt;
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

/// Where the download API says a track can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// A `t.me/<channel>/<id>` message carrying the file
    Telegram(String),
    /// A plain HTTP(S) file URL
    Direct(String),
}

const DIRECT_FIELDS: [&str; 5] = ["download_url", "url", "audio_url", "stream_url", "direct_url"];
const NESTED_DIRECT_FIELDS: [&str; 2] = ["download_url", "url"];

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// Pick the download link out of an API response; the first known field wins
pub fn resolve_download(response: &Value) -> Result<DownloadSource> {
    let Some(object) = response.as_object().filter(|o| !o.is_empty()) else {
        return Err(VcError::Download(
            "Failed to process query, please try again.".into(),
        ));
    };

    if let Some(link) = str_field(response, "link") {
        return Ok(DownloadSource::Telegram(link.to_string()));
    }
    for key in DIRECT_FIELDS {
        if let Some(url) = str_field(response, key) {
            return Ok(DownloadSource::Direct(url.to_string()));
        }
    }

    if let Some(data) = response.get("data").filter(|d| d.is_object()) {
        if let Some(link) = str_field(data, "link") {
            return Ok(DownloadSource::Telegram(link.to_string()));
        }
        for key in NESTED_DIRECT_FIELDS {
            if let Some(url) = str_field(data, key) {
                return Ok(DownloadSource::Direct(url.to_string()));
            }
        }
    }

    let fields: Vec<&str> = object.keys().map(String::as_str).collect();
    Err(VcError::Download(format!(
        "No download link found in API response. Available fields: {:?}",
        fields
    )))
}

/// Local cache location for a video id
pub fn cached_path(dir: &Path, video_id: &str, kind: StreamKind) -> PathBuf {
    dir.join(format!("{}.{}", video_id, kind.extension()))
}

/// `foo.mp3` → `foo.mp3.<uuid>.part`, unique per download so concurrent
/// requests for the same file never share a part file
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(format!(".{}.part", Uuid::new_v4().simple()));
    PathBuf::from(name)
}

/// Remove a part file left by a failed download
pub async fn discard_partial(part: &Path) {
    if let Err(e) = fs::remove_file(part).await {
        debug!("Could not remove {}: {}", part.display(), e);
    }
}

/// Move a finished part file into place, discarding it on failure
pub async fn publish_partial(part: &Path, dest: &Path) -> Result<()> {
    if let Err(e) = fs::rename(part, dest).await {
        discard_partial(part).await;
        return Err(e.into());
    }
    Ok(())
}

async fn write_body(response: reqwest::Response, part: &Path) -> Result<u64> {
    let mut file = fs::File::create(part).await?;
    let mut body = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

pub struct DownloadApi {
    api_client: Client,
    file_client: Client,
    config: DownloadConfig,
}

impl DownloadApi {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let api_client = Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .build()?;
        let file_client = Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()?;

        Ok(Self {
            api_client,
            file_client,
            config,
        })
    }

    /// Ask the API where `video_id` can be downloaded
    pub async fn fetch_song(&self, video_id: &str, kind: StreamKind) -> Result<Value> {
        let response = self
            .api_client
            .get(&self.config.api_url)
            .query(&[
                ("query", video_id),
                ("format", kind.api_format()),
                ("api_key", self.config.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: Value = response.json().await?;
        debug!("Download API response for {}: {}", video_id, data);
        Ok(data)
    }

    /// Stream `url` into `dest`. The file only appears once complete.
    pub async fn download_direct(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.file_client.get(url).send().await?.error_for_status()?;

        let part = partial_path(dest);
        let written = match write_body(response, &part).await {
            Ok(written) => written,
            Err(e) => {
                discard_partial(&part).await;
                return Err(e);
            }
        };
        publish_partial(&part, dest).await?;

        info!("Downloaded {} bytes to {}", written, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_wins() {
        let response = json!({"url": "https://cdn/x.mp3", "link": "https://t.me/db/5"});
        assert_eq!(
            resolve_download(&response).unwrap(),
            DownloadSource::Telegram("https://t.me/db/5".into())
        );
    }

    #[test]
    fn test_direct_field_order() {
        let response = json!({"stream_url": "https://s", "audio_url": "https://a"});
        assert_eq!(
            resolve_download(&response).unwrap(),
            DownloadSource::Direct("https://a".into())
        );
    }

    #[test]
    fn test_nested_data() {
        let response = json!({"status": "ok", "data": {"url": "https://cdn/y.mp3"}});
        assert_eq!(
            resolve_download(&response).unwrap(),
            DownloadSource::Direct("https://cdn/y.mp3".into())
        );

        let response = json!({"data": {"link": "https://t.me/db/9", "url": "https://z"}});
        assert_eq!(
            resolve_download(&response).unwrap(),
            DownloadSource::Telegram("https://t.me/db/9".into())
        );
    }

    #[test]
    fn test_unresolvable() {
        let err = resolve_download(&json!({"status": "error"})).unwrap_err();
        assert!(err.to_string().contains("Available fields"));

        let err = resolve_download(&json!({})).unwrap_err();
        assert!(err.to_string().contains("Failed to process query"));
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("downloads");
        assert_eq!(
            cached_path(dir, "abc", StreamKind::Audio),
            PathBuf::from("downloads/abc.mp3")
        );

        let first = partial_path(Path::new("downloads/abc.mp4"));
        let second = partial_path(Path::new("downloads/abc.mp4"));
        assert_ne!(first, second);
        for part in [&first, &second] {
            let name = part.to_string_lossy();
            assert!(name.starts_with("downloads/abc.mp4."));
            assert!(name.ends_with(".part"));
        }
    }
}

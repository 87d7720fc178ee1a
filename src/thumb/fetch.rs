//! Cover preparation
//!
//! Covers are normalised to 1280x720 JPEGs in the cache directory. Any
//! failure falls back to the configured default cover.

use crate::{Result, VcError};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use reqwest::Client;
use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COVER_WIDTH: u32 = 1280;
const COVER_HEIGHT: u32 = 720;
const JPEG_QUALITY: u8 = 90;

/// Cache file name for a cover source
pub fn cover_cache_path(cache_dir: &Path, source: &str) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    cache_dir.join(format!("thumbnail_{:016x}.jpg", hasher.finish()))
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Decode, resize and write a cover as JPEG
fn encode_cover(bytes: &[u8], output: &Path) -> Result<()> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| VcError::Thumbnail(format!("undecodable cover: {}", e)))?;
    let resized = image
        .resize_exact(COVER_WIDTH, COVER_HEIGHT, FilterType::Triangle)
        .to_rgb8();

    let mut writer = BufWriter::new(File::create(output)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(&resized)
        .map_err(|e| VcError::Thumbnail(format!("failed to encode cover: {}", e)))
}

async fn try_prepare(client: &Client, source: &str, cache_dir: &Path) -> Result<PathBuf> {
    let output = cover_cache_path(cache_dir, source);
    if output.is_file() {
        debug!("Cover cache hit for {}", source);
        return Ok(output);
    }

    tokio::fs::create_dir_all(cache_dir).await?;

    let bytes = if is_remote(source) {
        client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VcError::Thumbnail(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| VcError::Thumbnail(e.to_string()))?
            .to_vec()
    } else {
        tokio::fs::read(source).await?
    };

    let target = output.clone();
    tokio::task::spawn_blocking(move || encode_cover(&bytes, &target))
        .await
        .map_err(|e| VcError::Thumbnail(format!("cover task failed: {}", e)))??;

    Ok(output)
}

/// Prepare a cover from a URL or local path, or return `fallback`
pub async fn prepare_cover(client: &Client, source: &str, cache_dir: &Path, fallback: &Path) -> PathBuf {
    match try_prepare(client, source, cache_dir).await {
        Ok(path) => path,
        Err(e) => {
            warn!("Using fallback cover for {}: {}", source, e);
            fallback.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_cache_path_is_stable() {
        let dir = Path::new("cache");
        let a = cover_cache_path(dir, "https://i.ytimg.com/vi/x/hq720.jpg");
        let b = cover_cache_path(dir, "https://i.ytimg.com/vi/x/hq720.jpg");
        let c = cover_cache_path(dir, "https://i.ytimg.com/vi/y/hq720.jpg");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.to_string_lossy().ends_with(".jpg"));
    }

    #[tokio::test]
    async fn test_local_cover_is_resized() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cover.png");
        RgbImage::from_pixel(50, 50, Rgb([10, 20, 30])).save(&source).unwrap();

        let cache = dir.path().join("cache");
        let fallback = dir.path().join("fallback.png");
        let path = prepare_cover(&Client::new(), source.to_str().unwrap(), &cache, &fallback).await;

        assert_ne!(path, fallback);
        let prepared = image::open(&path).unwrap();
        assert_eq!((prepared.width(), prepared.height()), (COVER_WIDTH, COVER_HEIGHT));
    }

    #[tokio::test]
    async fn test_missing_cover_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("fallback.png");
        let path = prepare_cover(
            &Client::new(),
            "/no/such/cover.jpg",
            &dir.path().join("cache"),
            &fallback,
        )
        .await;
        assert_eq!(path, fallback);
    }
}

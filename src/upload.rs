//! Image storage and retrieval collaborators for the import pipeline.
//!
//! The pipeline never talks to a storage service directly. It goes through
//! [`ImageUploader`] to store bytes and [`ImageFetcher`] to read them, so
//! hosts can plug in their own CDN and tests can plug in fakes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::percent_decode_str;

use crate::error::{Error, Result};

/// Stores images and returns their public URLs.
///
/// Callers treat an `Err` as "keep the original reference".
#[async_trait]
pub trait ImageUploader: Send + Sync {
    /// Store image bytes.
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String>;

    /// Copy an externally hosted image into permanent storage.
    async fn move_to_permanent_storage(&self, url: &str) -> Result<String>;
}

/// Reads image bytes from a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Uploader that stores nothing. Rehosting keeps the original URL and
/// uploads fail, so cropped images stay uncropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUploader;

#[async_trait]
impl ImageUploader for NoopUploader {
    async fn upload_image(&self, _bytes: Vec<u8>) -> Result<String> {
        Err(Error::Upload("no image storage configured".to_string()))
    }

    async fn move_to_permanent_storage(&self, url: &str) -> Result<String> {
        Ok(url.to_string())
    }
}

/// Uploader that writes content-addressed files into a local directory and
/// returns `file://` URLs.
pub struct DirectoryUploader {
    dir: PathBuf,
    fetcher: Arc<dyn ImageFetcher>,
}

impl DirectoryUploader {
    pub fn new(dir: impl Into<PathBuf>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            dir: dir.into(),
            fetcher,
        }
    }
}

#[async_trait]
impl ImageUploader for DirectoryUploader {
    async fn upload_image(&self, bytes: Vec<u8>) -> Result<String> {
        let name = format!("{}.{}", sha1_smol::Sha1::from(&bytes).digest(), extension(&bytes));
        let path = self.dir.join(name);
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, &bytes).await?;

        let path = tokio::fs::canonicalize(&path).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "stored image");
        Ok(format!("file://{}", path.display()))
    }

    async fn move_to_permanent_storage(&self, url: &str) -> Result<String> {
        let bytes = self.fetcher.fetch(url).await?;
        self.upload_image(bytes).await
    }
}

/// File extension for image bytes, from their magic number.
fn extension(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Png) => "png",
        Ok(image::ImageFormat::Jpeg) => "jpg",
        Ok(image::ImageFormat::Gif) => "gif",
        Ok(image::ImageFormat::WebP) => "webp",
        _ => "bin",
    }
}

/// Decode a `data:` URL into its bytes.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let fail = |reason: &str| Error::Fetch {
        url: "data: URL".to_string(),
        reason: reason.to_string(),
    };
    let rest = url.strip_prefix("data:").ok_or_else(|| fail("not a data URL"))?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| fail("missing ','"))?;

    if header.ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact).map_err(|e| fail(&e.to_string()))
    } else {
        Ok(percent_decode_str(payload).collect())
    }
}

/// Fetches `http(s)` URLs with reqwest and decodes `data:` URLs in place.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

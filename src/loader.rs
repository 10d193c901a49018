//! Image loading from files, memory, URLs and async streams

use crate::download::http_client;
use crate::error::{BgRemovalError, Result};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A displayable image resource to decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image bytes (e.g. an uploaded file)
    Bytes(Vec<u8>),
    /// `http(s)` URL
    Url(String),
}

impl ImageSource {
    /// Interpret a CLI argument as a URL or a path
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
            Self::Url(url) => url.clone(),
        }
    }
}

/// Decodes image resources into pixel buffers
pub struct ImageLoader;

impl ImageLoader {
    /// Decode `source` into an image with known dimensions
    ///
    /// # Errors
    /// - `ImageLoad` for unreadable files, network failures, corrupt or
    ///   unsupported data, and zero-sized images
    pub async fn load(source: &ImageSource) -> Result<DynamicImage> {
        let image = match source {
            ImageSource::Path(path) => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    BgRemovalError::image_load(format!("cannot read '{}': {e}", path.display()))
                })?;
                Self::decode(&bytes)?
            },
            ImageSource::Bytes(bytes) => Self::decode(bytes)?,
            ImageSource::Url(url) => {
                let bytes = Self::fetch(url).await?;
                Self::decode(&bytes)?
            },
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::image_load(format!(
                "'{}' decoded to an empty image",
                source.describe()
            )));
        }

        log::debug!(
            "Loaded image {} ({}x{})",
            source.describe(),
            image.width(),
            image.height()
        );
        Ok(image)
    }

    /// Read an async stream to the end and decode it
    ///
    /// # Errors
    /// - `ImageLoad` on stream or decode failure
    pub async fn load_from_reader<R: AsyncRead + Unpin>(mut reader: R) -> Result<DynamicImage> {
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| BgRemovalError::image_load(format!("failed to read stream: {e}")))?;
        Self::load(&ImageSource::Bytes(buffer)).await
    }

    /// Decode encoded bytes, guessing the format from content
    ///
    /// # Errors
    /// - `ImageLoad` for corrupt or unsupported data
    pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
        image::load_from_memory(bytes)
            .map_err(|e| BgRemovalError::image_load(format!("failed to decode image: {e}")))
    }

    async fn fetch(url: &str) -> Result<Vec<u8>> {
        let client = http_client(Duration::from_secs(60))
            .map_err(|e| BgRemovalError::image_load(e.to_string()))?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::image_load(format!("request to '{url}' failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BgRemovalError::image_load(format!(
                "'{url}' returned HTTP {status}"
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BgRemovalError::image_load(format!("reading '{url}' failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}

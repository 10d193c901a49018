//! Model downloading over HTTP(S)
//!
//! Downloads go to a temporary file inside the cache directory and are renamed
//! into place only after the optional SHA-256 check passes, so a partial or
//! corrupt download never shows up as a cached model.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Build the HTTP client shared by model and image downloads
///
/// # Errors
/// - TLS backend initialization failure
pub fn http_client(timeout: std::time::Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))
}

/// Model downloader writing into a `ModelCache`
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a new model downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = http_client(std::time::Duration::from_secs(300))?;
        Ok(Self { client, cache })
    }

    /// Download `url` into the cache and return the cached path
    ///
    /// # Errors
    /// - HTTP failure or non-success status
    /// - Checksum mismatch
    /// - File system errors while persisting the artifact
    pub async fn download_model(&self, url: &str, expected_sha256: Option<&str>) -> Result<PathBuf> {
        if let Some(cached) = self.cache.cached_model_path(url) {
            log::info!("Model already cached: {}", cached.display());
            return Ok(cached);
        }

        log::info!("Downloading model from: {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::network_error("Model request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BgRemovalError::model_load(format!(
                "model download from '{url}' returned HTTP {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BgRemovalError::network_error("Model body download failed", e))?;
        if bytes.is_empty() {
            return Err(BgRemovalError::model_load(format!(
                "model download from '{url}' returned an empty body"
            )));
        }

        if let Some(expected) = expected_sha256 {
            verify_sha256(&bytes, expected)?;
        }

        let final_path = self.cache.model_path_for_url(url);
        self.persist(&bytes, &final_path)?;
        log::info!(
            "Successfully downloaded model ({} bytes) to {}",
            bytes.len(),
            final_path.display()
        );
        Ok(final_path)
    }

    fn persist(&self, bytes: &[u8], final_path: &Path) -> Result<()> {
        let cache_dir = self.cache.cache_dir();
        fs::create_dir_all(cache_dir)
            .map_err(|e| BgRemovalError::file_io_error("create cache directory", cache_dir, &e))?;

        let mut temp = tempfile::NamedTempFile::new_in(cache_dir)
            .map_err(|e| BgRemovalError::file_io_error("create temp file in", cache_dir, &e))?;
        temp.write_all(bytes)
            .map_err(|e| BgRemovalError::file_io_error("write temp file in", cache_dir, &e))?;
        temp.persist(final_path)
            .map_err(|e| BgRemovalError::file_io_error("persist model to", final_path, &e.error))?;
        Ok(())
    }
}

/// Check `bytes` against a hex-encoded SHA-256 digest (case-insensitive)
///
/// # Errors
/// - Digest mismatch, reported as `ModelLoad`
pub fn verify_sha256(bytes: &[u8], expected: &str) -> Result<()> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual = format!("{:x}", hasher.finalize());
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(BgRemovalError::model_load(format!(
            "checksum mismatch: expected {expected}, got {actual}"
        )))
    }
}

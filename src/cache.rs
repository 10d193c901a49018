//! Model cache management for downloaded saliency models
//!
//! Downloaded ONNX artifacts live in an XDG-compliant cache directory, one file
//! per source URL. The file name is derived from a hash of the URL so two
//! different URLs never collide.

use crate::error::{BgRemovalError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "STICKER_BGREMOVE_CACHE_DIR";

/// Information about a cached model file
#[derive(Debug, Clone)]
pub struct CachedModelInfo {
    /// Cache identifier (file stem)
    pub model_id: String,
    /// Path to the cached ONNX file
    pub path: PathBuf,
    /// Size of the file in bytes
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache manager
    ///
    /// Uses the XDG cache location:
    /// - Linux/macOS: `~/.cache/sticker-bgremove/models/`
    /// - Windows: `%LOCALAPPDATA%/sticker-bgremove/models/`
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;

        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                BgRemovalError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }

        Ok(Self { cache_dir })
    }

    /// Create a cache rooted at an explicit directory (created lazily on download)
    #[must_use]
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn get_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Failed to determine cache directory. Set {CACHE_DIR_ENV} environment variable."
                ))
            })?
            .join("sticker-bgremove")
            .join("models"))
    }

    /// Cache root directory
    #[must_use]
    pub fn cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }

    /// Generate a filesystem-safe model id from a URL
    ///
    /// ```
    /// use sticker_bgremove::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://example.com/models/u2netp.onnx");
    /// assert!(id.starts_with("u2netp-"));
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let short = digest.get(..16).unwrap_or(&digest);

        let stem = url
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix(".onnx"))
            .filter(|name| {
                !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            })
            .unwrap_or("model");

        format!("{stem}-{short}")
    }

    /// Path where the artifact for `url` is (or would be) stored
    #[must_use]
    pub fn model_path_for_url(&self, url: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}.onnx", Self::url_to_model_id(url)))
    }

    /// Path of the cached artifact for `url`, if a non-empty file is present
    #[must_use]
    pub fn cached_model_path(&self, url: &str) -> Option<PathBuf> {
        let path = self.model_path_for_url(url);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Some(path),
            _ => None,
        }
    }

    /// List all cached model files
    ///
    /// # Errors
    /// - Cache directory exists but cannot be read
    pub fn list_cached_models(&self) -> Result<Vec<CachedModelInfo>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        let mut models = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("onnx") {
                continue;
            }
            let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let model_id = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_default();
            models.push(CachedModelInfo {
                model_id,
                path,
                size_bytes,
            });
        }
        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        Ok(models)
    }

    /// Remove every cached model, returning the number of files deleted
    ///
    /// # Errors
    /// - A cached file cannot be removed
    pub fn clear_cache(&self) -> Result<usize> {
        let models = self.list_cached_models()?;
        for model in &models {
            fs::remove_file(&model.path)
                .map_err(|e| BgRemovalError::file_io_error("remove cached model", &model.path, &e))?;
        }
        Ok(models.len())
    }
}

/// Format a byte count for display
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS.get(unit).copied().unwrap_or("GB"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_url_to_model_id_is_stable_and_distinct() {
        let a = ModelCache::url_to_model_id("https://a.example/u2netp.onnx");
        let b = ModelCache::url_to_model_id("https://b.example/u2netp.onnx");
        assert_eq!(a, ModelCache::url_to_model_id("https://a.example/u2netp.onnx"));
        assert_ne!(a, b);
        assert!(a.starts_with("u2netp-"));
    }

    #[test]
    fn test_url_without_onnx_name_uses_generic_stem() {
        let id = ModelCache::url_to_model_id("https://example.com/download?id=42");
        assert!(id.starts_with("model-"));
    }

    #[test]
    fn test_cached_model_path_requires_non_empty_file() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_dir(temp.path().to_path_buf());
        let url = "https://example.com/u2netp.onnx";

        assert!(cache.cached_model_path(url).is_none());

        let path = cache.model_path_for_url(url);
        fs::write(&path, b"").unwrap();
        assert!(cache.cached_model_path(url).is_none());

        fs::write(&path, b"model-bytes").unwrap();
        assert_eq!(cache.cached_model_path(url), Some(path));
    }

    #[test]
    fn test_list_and_clear() {
        let temp = TempDir::new().unwrap();
        let cache = ModelCache::with_dir(temp.path().to_path_buf());
        fs::write(cache.model_path_for_url("https://x/u2netp.onnx"), b"abc").unwrap();
        fs::write(temp.path().join("notes.txt"), b"ignored").unwrap();

        let models = cache.list_cached_models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models.first().map(|m| m.size_bytes), Some(3));

        assert_eq!(cache.clear_cache().unwrap(), 1);
        assert!(cache.list_cached_models().unwrap().is_empty());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }
}

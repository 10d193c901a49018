//! Saliency model artifact specification and resolution
//!
//! A model is either a local ONNX file or a network URL. URL artifacts are
//! fetched once into the model cache and reused from disk afterwards.

use crate::cache::ModelCache;
use crate::download::ModelDownloader;
use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default network location of the u2netp saliency model
pub const DEFAULT_MODEL_URL: &str =
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx";

/// Default model input resolution (square)
pub const DEFAULT_INPUT_SIZE: u32 = 320;

/// Where the saliency model artifact comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "location")]
pub enum ModelSource {
    /// ONNX file on the local filesystem
    Path(PathBuf),
    /// ONNX file served over HTTP(S), cached after first download
    Url(String),
}

impl ModelSource {
    /// Parse a CLI/config string: anything starting with `http://` or `https://` is a URL
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }

    /// Human-readable name for logs
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => format!("file:{}", path.display()),
            Self::Url(url) => format!("url:{url}"),
        }
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Url(DEFAULT_MODEL_URL.to_string())
    }
}

/// Resolves a `ModelSource` to a readable ONNX file on disk
#[derive(Debug)]
pub struct ModelResolver {
    cache: ModelCache,
}

impl ModelResolver {
    /// Create a resolver backed by the default model cache
    ///
    /// # Errors
    /// - Cache directory cannot be determined or created
    pub fn new() -> Result<Self> {
        Ok(Self {
            cache: ModelCache::new()?,
        })
    }

    /// Create a resolver backed by a specific cache
    #[must_use]
    pub fn with_cache(cache: ModelCache) -> Self {
        Self { cache }
    }

    /// Return the local path of the model, downloading it first when needed
    ///
    /// Every failure is reported as `ModelLoad`, since the caller is creating an
    /// inference session.
    ///
    /// # Errors
    /// - Local file missing
    /// - Download or integrity check failure
    pub async fn resolve(&self, source: &ModelSource, sha256: Option<&str>) -> Result<PathBuf> {
        match source {
            ModelSource::Path(path) => {
                Self::check_local(path)?;
                Ok(path.clone())
            },
            ModelSource::Url(url) => {
                if let Some(cached) = self.cache.cached_model_path(url) {
                    log::debug!("Using cached model {}", cached.display());
                    return Ok(cached);
                }
                let downloader = ModelDownloader::new(self.cache.clone())
                    .map_err(|e| BgRemovalError::model_load(e.to_string()))?;
                downloader
                    .download_model(url, sha256)
                    .await
                    .map_err(|e| match e {
                        BgRemovalError::ModelLoad(_) => e,
                        other => BgRemovalError::model_load(other.to_string()),
                    })
            },
        }
    }

    fn check_local(path: &Path) -> Result<()> {
        if path.is_file() {
            Ok(())
        } else {
            Err(BgRemovalError::model_load(format!(
                "model file '{}' does not exist",
                path.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_source() {
        assert_eq!(
            ModelSource::parse("https://example.com/u2netp.onnx"),
            ModelSource::Url("https://example.com/u2netp.onnx".to_string())
        );
        assert_eq!(
            ModelSource::parse("models/u2netp.onnx"),
            ModelSource::Path(PathBuf::from("models/u2netp.onnx"))
        );
    }

    #[test]
    fn test_default_source_is_url() {
        assert!(matches!(ModelSource::default(), ModelSource::Url(_)));
        assert!(ModelSource::default().display_name().starts_with("url:"));
    }

    #[test]
    fn test_model_source_serde_roundtrip() {
        let source = ModelSource::Path(PathBuf::from("/models/u2netp.onnx"));
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"kind\":\"path\""));
        let parsed: ModelSource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, source);
    }

    #[tokio::test]
    async fn test_missing_local_model_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::with_cache(ModelCache::with_dir(dir.path().to_path_buf()));
        let missing = ModelSource::Path(dir.path().join("missing.onnx"));

        let err = resolver.resolve(&missing, None).await.unwrap_err();
        assert!(matches!(err, BgRemovalError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn test_existing_local_model_resolves_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("u2netp.onnx");
        std::fs::write(&model_path, b"onnx").unwrap();
        let resolver = ModelResolver::with_cache(ModelCache::with_dir(dir.path().join("cache")));

        let resolved = resolver
            .resolve(&ModelSource::Path(model_path.clone()), None)
            .await
            .unwrap();
        assert_eq!(resolved, model_path);
    }
}

//! Configuration types for background removal operations

use crate::error::{BgRemovalError, Result};
use crate::models::{ModelSource, DEFAULT_INPUT_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgRemovalError::invalid_config(format!(
                "unknown execution provider '{other}' (expected auto, cpu, cuda, coreml)"
            ))),
        }
    }
}

/// Inference backend used to run the saliency model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Tract (pure Rust)
    Tract,
    /// ONNX Runtime
    Onnx,
    /// Synthetic saliency for tests and dry runs
    Mock,
}

impl Default for BackendKind {
    fn default() -> Self {
        if cfg!(feature = "tract") {
            Self::Tract
        } else if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Mock
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tract => write!(f, "tract"),
            Self::Onnx => write!(f, "onnx"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tract" => Ok(Self::Tract),
            "onnx" => Ok(Self::Onnx),
            "mock" => Ok(Self::Mock),
            other => Err(BgRemovalError::invalid_config(format!(
                "unknown backend '{other}' (expected tract, onnx, mock)"
            ))),
        }
    }
}

/// Configuration for background removal operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Longest side of the working image in pixels
    pub max_side: u32,

    /// Square input resolution expected by the saliency model
    pub model_input_size: u32,

    /// Grayscale threshold (0-255) at or above which a pixel is foreground
    pub threshold: u8,

    /// Number of 3-tap box blur passes applied to the mask edge (0 = hard edge)
    pub feather_radius: u32,

    /// Upper bound on waiting for the inference runtime to become ready
    pub runtime_wait_ms: u64,

    /// Polling interval while waiting for the runtime
    pub runtime_poll_ms: u64,

    /// Inference backend
    pub backend: BackendKind,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Saliency model artifact
    pub model: ModelSource,

    /// Expected SHA-256 of a downloaded model (hex)
    pub model_sha256: Option<String>,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Clear a failed session load so the next call retries it
    pub retry_failed_session_load: bool,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            max_side: 1280,
            model_input_size: DEFAULT_INPUT_SIZE,
            threshold: 128,
            feather_radius: 2,
            runtime_wait_ms: 15_000,
            runtime_poll_ms: 100,
            backend: BackendKind::default(),
            execution_provider: ExecutionProvider::default(),
            model: ModelSource::default(),
            model_sha256: None,
            intra_threads: 0,
            retry_failed_session_load: true,
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use sticker_bgremove::{BackendKind, RemovalConfig};
    ///
    /// let config = RemovalConfig::builder()
    ///     .backend(BackendKind::Mock)
    ///     .feather_radius(3)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.feather_radius, 3);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - JSON is malformed
    /// - Resulting configuration fails validation
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            BgRemovalError::invalid_config(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Zero `max_side` or `model_input_size`
    /// - Zero threshold
    /// - Feather radius above 64
    /// - Zero poll interval, or a wait shorter than one poll interval
    pub fn validate(&self) -> Result<()> {
        if self.max_side == 0 {
            return Err(BgRemovalError::config_value_error("max side", self.max_side, ">= 1"));
        }
        if self.model_input_size == 0 {
            return Err(BgRemovalError::config_value_error(
                "model input size",
                self.model_input_size,
                ">= 1",
            ));
        }
        if self.threshold == 0 {
            return Err(BgRemovalError::config_value_error("threshold", self.threshold, "1-255"));
        }
        if self.feather_radius > 64 {
            return Err(BgRemovalError::config_value_error(
                "feather radius",
                self.feather_radius,
                "0-64",
            ));
        }
        if self.runtime_poll_ms == 0 || self.runtime_wait_ms < self.runtime_poll_ms {
            return Err(BgRemovalError::invalid_config(format!(
                "runtime wait ({}ms) must be at least one non-zero poll interval ({}ms)",
                self.runtime_wait_ms, self.runtime_poll_ms
            )));
        }
        Ok(())
    }

    /// Bounded wait for the inference runtime
    #[must_use]
    pub fn runtime_wait(&self) -> Duration {
        Duration::from_millis(self.runtime_wait_ms)
    }

    /// Polling interval for the runtime readiness check
    #[must_use]
    pub fn runtime_poll_interval(&self) -> Duration {
        Duration::from_millis(self.runtime_poll_ms)
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    #[must_use]
    pub fn max_side(mut self, max_side: u32) -> Self {
        self.config.max_side = max_side;
        self
    }

    #[must_use]
    pub fn model_input_size(mut self, size: u32) -> Self {
        self.config.model_input_size = size;
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.config.threshold = threshold;
        self
    }

    #[must_use]
    pub fn feather_radius(mut self, radius: u32) -> Self {
        self.config.feather_radius = radius;
        self
    }

    #[must_use]
    pub fn runtime_wait(mut self, wait: Duration) -> Self {
        self.config.runtime_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn runtime_poll_interval(mut self, interval: Duration) -> Self {
        self.config.runtime_poll_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendKind) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn model(mut self, model: ModelSource) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn model_sha256<S: Into<String>>(mut self, sha256: S) -> Self {
        self.config.model_sha256 = Some(sha256.into());
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn retry_failed_session_load(mut self, retry: bool) -> Self {
        self.config.retry_failed_session_load = retry;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Validation failures (see `RemovalConfig::validate`)
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = RemovalConfig::default();
        assert_eq!(config.max_side, 1280);
        assert_eq!(config.model_input_size, 320);
        assert_eq!(config.threshold, 128);
        assert_eq!(config.feather_radius, 2);
        assert_eq!(config.runtime_wait(), Duration::from_secs(15));
        assert_eq!(config.runtime_poll_interval(), Duration::from_millis(100));
        assert!(config.retry_failed_session_load);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_validation() {
        assert!(RemovalConfig::builder().threshold(0).build().is_err());
        assert!(RemovalConfig::builder().max_side(0).build().is_err());
        assert!(RemovalConfig::builder().feather_radius(65).build().is_err());
        assert!(RemovalConfig::builder()
            .runtime_poll_interval(Duration::from_millis(0))
            .build()
            .is_err());

        let config = RemovalConfig::builder()
            .threshold(200)
            .feather_radius(0)
            .backend(BackendKind::Mock)
            .build()
            .unwrap();
        assert_eq!(config.threshold, 200);
        assert_eq!(config.feather_radius, 0);
        assert_eq!(config.backend, BackendKind::Mock);
    }

    #[test]
    fn test_parse_enums() {
        assert_eq!("CoreML".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::CoreMl);
        assert_eq!("tract".parse::<BackendKind>().unwrap(), BackendKind::Tract);
        assert!("gpu".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_from_json_file_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "feather_radius": 4, "backend": "mock", "model": { "kind": "path", "location": "/m/u2netp.onnx" } }"#,
        )
        .unwrap();

        let config = RemovalConfig::from_json_file(&path).unwrap();
        assert_eq!(config.feather_radius, 4);
        assert_eq!(config.backend, BackendKind::Mock);
        assert_eq!(config.model, ModelSource::Path(PathBuf::from("/m/u2netp.onnx")));
        assert_eq!(config.threshold, 128);
    }

    #[test]
    fn test_from_json_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "threshold": 0 }"#).unwrap();

        let err = RemovalConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));
    }
}

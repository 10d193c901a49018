//! Tract backend for saliency models
//!
//! Pure Rust ONNX inference with no native runtime to install, which makes it
//! the default backend. The compiled plan is immutable and shared, so each
//! inference runs on the blocking pool without locking.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use crate::inference::{SaliencyBackend, SessionLoader};
use crate::models::{ModelResolver, ModelSource};
use async_trait::async_trait;
use instant::Instant;
use ndarray::{Array4, Ix4};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Saliency backend running an optimized Tract plan
pub struct TractBackend {
    model: Arc<TractModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load, optimize and compile an ONNX model with a fixed `[1, 3, S, S]` input
    ///
    /// # Errors
    /// - `ModelLoad` if the file cannot be parsed or optimized
    pub fn from_path(path: &Path, input_size: u32) -> Result<Self> {
        let load_start = Instant::now();
        let size = input_size as usize;

        log::info!("🚀 Initializing Tract backend");
        log::info!("🧠 Model: {}", path.display());

        let model = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| BgRemovalError::model_load(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| BgRemovalError::model_load(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model_load(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::model_load(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "✅ Tract backend initialized in {}ms",
            load_start.elapsed().as_millis()
        );

        Ok(Self {
            model: Arc::new(model),
            input_size,
        })
    }

    fn run(model: &TractModel, input: Array4<f32>) -> Result<Array4<f32>> {
        let outputs = model
            .run(tvec![Tensor::from(input).into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?;

        let view = output.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        view.to_owned().into_dimensionality::<Ix4>().map_err(|e| {
            BgRemovalError::inference(format!("Expected 4D output tensor: {e}"))
        })
    }
}

#[async_trait]
impl SaliencyBackend for TractBackend {
    fn name(&self) -> &str {
        "tract"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    async fn infer(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let model = Arc::clone(&self.model);
        let output = tokio::task::spawn_blocking(move || Self::run(&model, input))
            .await
            .map_err(|e| BgRemovalError::inference(format!("Inference task failed: {e}")))??;

        log::debug!(
            "✅ Tract inference completed in {}ms, output {:?}",
            inference_start.elapsed().as_millis(),
            output.shape()
        );
        Ok(output)
    }
}

/// Resolves the model artifact and compiles it with Tract
#[derive(Debug, Clone)]
pub struct TractSessionLoader {
    model: ModelSource,
    sha256: Option<String>,
    input_size: u32,
    cache: Option<ModelCache>,
}

impl TractSessionLoader {
    #[must_use]
    pub fn new(model: ModelSource, sha256: Option<String>, input_size: u32) -> Self {
        Self {
            model,
            sha256,
            input_size,
            cache: None,
        }
    }

    /// Use a specific model cache instead of the default location
    #[must_use]
    pub fn with_cache(mut self, cache: ModelCache) -> Self {
        self.cache = Some(cache);
        self
    }

    async fn resolve(&self) -> Result<PathBuf> {
        let resolver = match &self.cache {
            Some(cache) => ModelResolver::with_cache(cache.clone()),
            None => ModelResolver::new()?,
        };
        resolver.resolve(&self.model, self.sha256.as_deref()).await
    }
}

#[async_trait]
impl SessionLoader for TractSessionLoader {
    async fn load(&self) -> Result<Arc<dyn SaliencyBackend>> {
        let path = self.resolve().await?;
        let input_size = self.input_size;
        let backend = tokio::task::spawn_blocking(move || TractBackend::from_path(&path, input_size))
            .await
            .map_err(|e| BgRemovalError::model_load(format!("Model loading task failed: {e}")))??;
        Ok(Arc::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_model_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TractSessionLoader::new(
            ModelSource::Path(dir.path().join("absent.onnx")),
            None,
            320,
        )
        .with_cache(ModelCache::with_dir(dir.path().to_path_buf()));

        let err = loader.load().await.err().unwrap();
        assert!(matches!(err, BgRemovalError::ModelLoad(_)));
    }

    #[tokio::test]
    async fn test_garbage_model_file_is_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.onnx");
        std::fs::write(&path, b"definitely not protobuf").unwrap();

        let loader = TractSessionLoader::new(ModelSource::Path(path), None, 320)
            .with_cache(ModelCache::with_dir(dir.path().to_path_buf()));

        let err = loader.load().await.err().unwrap();
        assert!(matches!(err, BgRemovalError::ModelLoad(_)));
    }
}

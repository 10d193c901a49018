//! ONNX Runtime backend for saliency models
//!
//! Uses ONNX Runtime with a selectable execution provider (CPU, CUDA, CoreML).
//! `Session::run` needs exclusive access, so the session sits behind a mutex
//! and inference runs on the blocking pool.

use crate::cache::ModelCache;
use crate::config::ExecutionProvider;
use crate::error::{BgRemovalError, Result};
use crate::inference::{SaliencyBackend, SessionLoader};
use crate::models::{ModelResolver, ModelSource};
use async_trait::async_trait;
use instant::Instant;
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Saliency backend running an ONNX Runtime session
pub struct OnnxBackend {
    session: Arc<Mutex<Session>>,
    input_size: u32,
}

impl OnnxBackend {
    /// Create a session for the model at `path`
    ///
    /// # Errors
    /// - `ModelLoad` if the session cannot be built or the file is not a valid model
    pub fn from_path(
        path: &Path,
        input_size: u32,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> Result<Self> {
        let load_start = Instant::now();
        log::info!("🚀 Initializing ONNX Runtime backend");
        log::info!("🧠 Model: {}", path.display());

        let builder = Session::builder()
            .map_err(|e| {
                BgRemovalError::model_load(format!("Failed to create session builder: {e}"))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::model_load(format!("Failed to set optimization level: {e}"))
            })?;

        let builder = Self::configure_provider(builder, provider)?;

        let intra_threads = if intra_threads > 0 {
            intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZero::get)
                .unwrap_or(4)
        };

        let session = builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::model_load(format!("Failed to set intra threads: {e}")))?
            .commit_from_file(path)
            .map_err(|e| {
                BgRemovalError::model_load(format!("Failed to create session from model: {e}"))
            })?;

        log::info!(
            "✅ ONNX Runtime backend initialized in {}ms ({intra_threads} threads)",
            load_start.elapsed().as_millis()
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_size,
        })
    }

    fn configure_provider(
        builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        match provider {
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Ok(builder)
            },
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();

                let cuda = CUDAExecutionProvider::default();
                if OrtExecutionProvider::is_available(&cuda).unwrap_or(false) {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(cuda.build());
                }

                let coreml = CoreMLExecutionProvider::default();
                if OrtExecutionProvider::is_available(&coreml).unwrap_or(false) {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(coreml.with_subgraphs(true).build());
                }

                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                    return Ok(builder);
                }
                builder.with_execution_providers(providers).map_err(|e| {
                    BgRemovalError::model_load(format!(
                        "Failed to set auto execution providers: {e}"
                    ))
                })
            },
            ExecutionProvider::Cuda => {
                let cuda = CUDAExecutionProvider::default();
                if !OrtExecutionProvider::is_available(&cuda).unwrap_or(false) {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    return Ok(builder);
                }
                log::info!("Using CUDA execution provider");
                builder.with_execution_providers([cuda.build()]).map_err(|e| {
                    BgRemovalError::model_load(format!(
                        "Failed to set CUDA execution provider: {e}"
                    ))
                })
            },
            ExecutionProvider::CoreMl => {
                let coreml = CoreMLExecutionProvider::default();
                if !OrtExecutionProvider::is_available(&coreml).unwrap_or(false) {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    return Ok(builder);
                }
                log::info!("🍎 Using CoreML execution provider");
                builder
                    .with_execution_providers([coreml.with_subgraphs(true).build()])
                    .map_err(|e| {
                        BgRemovalError::model_load(format!(
                            "Failed to set CoreML execution provider: {e}"
                        ))
                    })
            },
        }
    }

    fn run(session: &Mutex<Session>, input: Array4<f32>) -> Result<Array4<f32>> {
        let input_value = Value::from_array(input).map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| {
                BgRemovalError::inference(format!("Failed to extract output tensor: {e}"))
            })?;

        output.to_owned().into_dimensionality::<Ix4>().map_err(|e| {
            BgRemovalError::inference(format!("Expected 4D output tensor: {e}"))
        })
    }
}

#[async_trait]
impl SaliencyBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    async fn infer(&self, input: Array4<f32>) -> Result<Array4<f32>> {
        log::debug!("🔮 Running ONNX inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let session = Arc::clone(&self.session);
        let output = tokio::task::spawn_blocking(move || Self::run(&session, input))
            .await
            .map_err(|e| BgRemovalError::inference(format!("Inference task failed: {e}")))??;

        log::debug!(
            "⚡ ONNX inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output)
    }
}

/// Resolves the model artifact and opens an ONNX Runtime session for it
#[derive(Debug, Clone)]
pub struct OnnxSessionLoader {
    model: ModelSource,
    sha256: Option<String>,
    input_size: u32,
    provider: ExecutionProvider,
    intra_threads: usize,
    cache: Option<ModelCache>,
}

impl OnnxSessionLoader {
    #[must_use]
    pub fn new(
        model: ModelSource,
        sha256: Option<String>,
        input_size: u32,
        provider: ExecutionProvider,
        intra_threads: usize,
    ) -> Self {
        Self {
            model,
            sha256,
            input_size,
            provider,
            intra_threads,
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
impl SessionLoader for OnnxSessionLoader {
    async fn load(&self) -> Result<Arc<dyn SaliencyBackend>> {
        let path = self.resolve().await?;
        let (input_size, provider, intra_threads) =
            (self.input_size, self.provider, self.intra_threads);
        let backend = tokio::task::spawn_blocking(move || {
            OnnxBackend::from_path(&path, input_size, provider, intra_threads)
        })
        .await
        .map_err(|e| BgRemovalError::model_load(format!("Model loading task failed: {e}")))??;
        Ok(Arc::new(backend))
    }
}

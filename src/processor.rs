//! Background removal pipeline
//!
//! `BackgroundRemover` runs the whole flow for one image: wait for the runtime,
//! decode, obtain the memoized session, preprocess, infer, then refine the
//! saliency into a single soft-edged region and composite the PNG. Only the
//! runtime wait, decoding, session creation and inference suspend; the
//! refinement steps are synchronous.

use crate::{
    backends::{MockBackend, MockSessionLoader},
    compositor::Compositor,
    config::{BackendKind, RemovalConfig},
    error::{BgRemovalError, Result},
    feather::feather_mask,
    inference::{
        wait_for_runtime, LinkedRuntime, RuntimeProbe, SessionLoader, SessionProvider,
        SessionStatus,
    },
    loader::{ImageLoader, ImageSource},
    mask::{BinaryMask, MaskBuilder, SaliencyMap},
    region::{RegionSelector, SeedPoint},
    seed::{map_display_to_working, DisplayPoint, DisplaySize},
    services::{ProcessingStage, ProgressReporter, ProgressTracker},
    types::{CutoutResult, MaskStatistics, ProcessingMetadata, ProcessingTimings},
    utils::{working_dimensions, SaliencyPreprocessor, TensorValidator},
};
use chrono::Utc;
use image::{DynamicImage, GrayImage};
use instant::Instant;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// Factory creating the session loader for a configured backend
pub trait BackendFactory: Send + Sync {
    /// Create the loader for `config.backend`
    ///
    /// # Errors
    /// - `InvalidConfig` if the backend is not compiled in
    fn create_loader(&self, config: &RemovalConfig) -> Result<Arc<dyn SessionLoader>>;

    /// List backends this build can create
    fn available_backends(&self) -> Vec<BackendKind>;
}

/// Default backend factory implementation
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_loader(&self, config: &RemovalConfig) -> Result<Arc<dyn SessionLoader>> {
        match config.backend {
            BackendKind::Tract => tract_loader(config),
            BackendKind::Onnx => onnx_loader(config),
            BackendKind::Mock => Ok(Arc::new(MockSessionLoader::new(MockBackend::new(
                config.model_input_size,
            )))),
        }
    }

    fn available_backends(&self) -> Vec<BackendKind> {
        let mut backends = Vec::new();
        if cfg!(feature = "tract") {
            backends.push(BackendKind::Tract);
        }
        if cfg!(feature = "onnx") {
            backends.push(BackendKind::Onnx);
        }
        backends.push(BackendKind::Mock);
        backends
    }
}

#[cfg(feature = "tract")]
fn tract_loader(config: &RemovalConfig) -> Result<Arc<dyn SessionLoader>> {
    Ok(Arc::new(crate::backends::TractSessionLoader::new(
        config.model.clone(),
        config.model_sha256.clone(),
        config.model_input_size,
    )))
}

#[cfg(not(feature = "tract"))]
fn tract_loader(_config: &RemovalConfig) -> Result<Arc<dyn SessionLoader>> {
    Err(BgRemovalError::invalid_config(
        "Tract backend not compiled in (enable the `tract` feature)",
    ))
}

#[cfg(feature = "onnx")]
fn onnx_loader(config: &RemovalConfig) -> Result<Arc<dyn SessionLoader>> {
    Ok(Arc::new(crate::backends::OnnxSessionLoader::new(
        config.model.clone(),
        config.model_sha256.clone(),
        config.model_input_size,
        config.execution_provider,
        config.intra_threads,
    )))
}

#[cfg(not(feature = "onnx"))]
fn onnx_loader(_config: &RemovalConfig) -> Result<Arc<dyn SessionLoader>> {
    Err(BgRemovalError::invalid_config(
        "ONNX backend not compiled in (enable the `onnx` feature)",
    ))
}

/// Where the user asked to keep the subject
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeedRequest {
    /// Already in working-resolution pixels
    Working(SeedPoint),
    /// A press on the displayed image, mapped once the working size is known
    Display {
        point: DisplayPoint,
        display: DisplaySize,
    },
}

impl SeedRequest {
    /// Resolve to working pixels for a `working_width` x `working_height` image
    ///
    /// # Errors
    /// - `InvalidInput` for a non-positive display size
    pub fn resolve(&self, working_width: u32, working_height: u32) -> Result<SeedPoint> {
        match *self {
            Self::Working(point) => Ok(point),
            Self::Display { point, display } => {
                map_display_to_working(point, display, working_width, working_height)
            },
        }
    }
}

/// Refined mask and alpha for one saliency map
#[derive(Debug, Clone)]
pub struct RefinedMask {
    /// Selected region
    pub region: BinaryMask,
    /// Feathered alpha
    pub alpha: GrayImage,
    /// Whether the seed chose the region
    pub seed_used: bool,
}

/// Runs background removal with a memoized inference session
pub struct BackgroundRemover {
    config: RemovalConfig,
    sessions: SessionProvider,
    runtime: Arc<dyn RuntimeProbe>,
    reporter: Option<Arc<dyn ProgressReporter>>,
}

impl BackgroundRemover {
    /// Create a remover for `config` using the default backend factory
    ///
    /// Nothing is loaded until the first run.
    ///
    /// # Errors
    /// - Invalid configuration or backend not compiled in
    pub fn new(config: RemovalConfig) -> Result<Self> {
        Self::with_factory(config, &DefaultBackendFactory)
    }

    /// Create a remover with a custom backend factory
    ///
    /// # Errors
    /// - Invalid configuration or factory failure
    pub fn with_factory(config: RemovalConfig, factory: &dyn BackendFactory) -> Result<Self> {
        config.validate()?;
        let loader = factory.create_loader(&config)?;
        Self::with_loader(config, loader)
    }

    /// Create a remover around an explicit session loader
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_loader(config: RemovalConfig, loader: Arc<dyn SessionLoader>) -> Result<Self> {
        config.validate()?;
        let sessions = SessionProvider::new(loader, config.retry_failed_session_load);
        Ok(Self {
            config,
            sessions,
            runtime: Arc::new(LinkedRuntime),
            reporter: None,
        })
    }

    /// Replace the runtime readiness probe
    #[must_use]
    pub fn with_runtime_probe(mut self, probe: Arc<dyn RuntimeProbe>) -> Self {
        self.runtime = probe;
        self
    }

    /// Report stage progress to `reporter`
    #[must_use]
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn session_status(&self) -> SessionStatus {
        self.sessions.status()
    }

    #[must_use]
    pub fn session_provider(&self) -> &SessionProvider {
        &self.sessions
    }

    fn tracker(&self) -> ProgressTracker {
        self.reporter
            .as_ref()
            .map_or_else(ProgressTracker::no_op, |r| ProgressTracker::new(Arc::clone(r)))
    }

    /// Decode `source` and remove its background
    ///
    /// # Errors
    /// - `RuntimeUnavailable`, `ImageLoad`, `ModelLoad`, `Inference`, `Encode`,
    ///   or `InvalidInput` for an unusable display seed
    pub async fn remove_background(
        &self,
        source: &ImageSource,
        seed: Option<SeedRequest>,
    ) -> Result<CutoutResult> {
        let span = info_span!("background_removal", backend = %self.config.backend);
        let mut tracker = self.tracker();
        let outcome = self
            .run(&mut tracker, RunInput::Source(source), seed)
            .instrument(span)
            .await;
        if let Err(e) = &outcome {
            tracker.report_error(&e.to_string());
        }
        outcome
    }

    /// Remove the background of an already decoded image
    ///
    /// # Errors
    /// - Same as [`BackgroundRemover::remove_background`] minus `ImageLoad`
    pub async fn process_image(
        &self,
        image: &DynamicImage,
        seed: Option<SeedRequest>,
    ) -> Result<CutoutResult> {
        let span = info_span!("background_removal", backend = %self.config.backend);
        let mut tracker = self.tracker();
        let outcome = self
            .run(&mut tracker, RunInput::Decoded(image), seed)
            .instrument(span)
            .await;
        if let Err(e) = &outcome {
            tracker.report_error(&e.to_string());
        }
        outcome
    }

    async fn run(
        &self,
        tracker: &mut ProgressTracker,
        input: RunInput<'_>,
        seed: Option<SeedRequest>,
    ) -> Result<CutoutResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();

        tracker.report_stage(ProcessingStage::Initialization);
        let wait_start = Instant::now();
        wait_for_runtime(
            self.runtime.as_ref(),
            self.config.runtime_wait(),
            self.config.runtime_poll_interval(),
        )
        .await?;
        let runtime_wait = wait_start.elapsed();

        tracker.report_stage(ProcessingStage::ImageLoading);
        let decode_start = Instant::now();
        let loaded;
        let image = match input {
            RunInput::Source(source) => {
                loaded = ImageLoader::load(source).await?;
                &loaded
            },
            RunInput::Decoded(image) => image,
        };
        timings.image_decode_ms = decode_start.elapsed().as_millis() as u64;

        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::invalid_input(format!(
                "image has no pixels ({}x{})",
                image.width(),
                image.height()
            )));
        }
        let (working_width, working_height) =
            working_dimensions(image.width(), image.height(), self.config.max_side);
        let seed_point = seed
            .map(|s| s.resolve(working_width, working_height))
            .transpose()?;

        let session_start = Instant::now();
        let session = self.sessions.session().await?;
        timings.model_load_ms = (runtime_wait + session_start.elapsed()).as_millis() as u64;

        tracker.report_stage(ProcessingStage::Preprocessing);
        let preprocess_start = Instant::now();
        let original_dimensions = (image.width(), image.height());
        let (working, input_tensor) = {
            let _span = info_span!(
                "preprocessing",
                original_width = original_dimensions.0,
                original_height = original_dimensions.1
            )
            .entered();
            let working = SaliencyPreprocessor::to_working_image(image, self.config.max_side);
            let tensor = SaliencyPreprocessor::to_input_tensor(&working, session.input_size())?;
            TensorValidator::validate_input(&tensor, session.input_size())?;
            (working, tensor)
        };
        timings.preprocessing_ms = preprocess_start.elapsed().as_millis() as u64;

        tracker.report_stage(ProcessingStage::Inference);
        let inference_start = Instant::now();
        let output = session
            .infer(input_tensor)
            .instrument(info_span!("inference", backend = session.name()))
            .await?;
        TensorValidator::validate_saliency_output(&output)?;
        timings.inference_ms = inference_start.elapsed().as_millis() as u64;

        debug_assert_eq!(working.dimensions(), (working_width, working_height));

        let refine_start = Instant::now();
        let saliency = SaliencyMap::from_tensor(&output)?;
        let refined = self.refine_with_progress(
            tracker,
            &saliency,
            working_width,
            working_height,
            seed_point,
        );
        timings.mask_refinement_ms = refine_start.elapsed().as_millis() as u64;

        tracker.report_stage(ProcessingStage::Compositing);
        let composite_start = Instant::now();
        let (image, png) = {
            let _span = info_span!("compositing", width = working_width, height = working_height)
                .entered();
            let cutout = Compositor::composite(&working, &refined.alpha)?;
            let png = Compositor::encode_png(&cutout)?;
            (cutout, png)
        };
        timings.compositing_ms = composite_start.elapsed().as_millis() as u64;
        timings.total_ms = total_start.elapsed().as_millis() as u64;

        tracker.report_stage(ProcessingStage::Completed);
        tracker.report_completion(&timings);

        let metadata = ProcessingMetadata {
            timings,
            backend: session.name().to_string(),
            model: self.config.model.display_name(),
            working_dimensions: (working_width, working_height),
            seed: seed_point,
            seed_used: refined.seed_used,
            threshold: self.config.threshold,
            feather_radius: self.config.feather_radius,
            mask_statistics: MaskStatistics::from_mask(&refined.region),
            processed_at: Utc::now(),
        };

        tracing::info!(
            width = working_width,
            height = working_height,
            foreground = metadata.mask_statistics.foreground_pixels,
            seed_used = metadata.seed_used,
            total_ms = metadata.timings.total_ms,
            "Background removed"
        );

        Ok(CutoutResult {
            image,
            png,
            mask: refined.region,
            alpha: refined.alpha,
            original_dimensions,
            metadata,
        })
    }

    /// Threshold, select and feather a saliency map at working resolution
    #[must_use]
    pub fn refine(
        &self,
        saliency: &SaliencyMap,
        working_width: u32,
        working_height: u32,
        seed: Option<SeedPoint>,
    ) -> RefinedMask {
        self.refine_with_progress(
            &mut ProgressTracker::no_op(),
            saliency,
            working_width,
            working_height,
            seed,
        )
    }

    fn refine_with_progress(
        &self,
        tracker: &mut ProgressTracker,
        saliency: &SaliencyMap,
        working_width: u32,
        working_height: u32,
        seed: Option<SeedPoint>,
    ) -> RefinedMask {
        let _span = info_span!("mask_refinement", threshold = self.config.threshold).entered();

        tracker.report_stage(ProcessingStage::MaskGeneration);
        let mask = MaskBuilder::build(saliency, working_width, working_height, self.config.threshold);

        tracker.report_stage(ProcessingStage::RegionSelection);
        let seed_used = seed.is_some_and(|s| RegionSelector::seed_hits(&mask, s));
        if seed.is_some() && !seed_used {
            tracing::debug!(?seed, "Seed misses the foreground, keeping the largest region");
        }
        let region = RegionSelector::select(&mask, seed);

        tracker.report_stage(ProcessingStage::Feathering);
        let alpha = feather_mask(&region, self.config.feather_radius);

        RefinedMask {
            region,
            alpha,
            seed_used,
        }
    }
}

enum RunInput<'a> {
    Source(&'a ImageSource),
    Decoded(&'a DynamicImage),
}

#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Sticker Background Removal Library
//!
//! Interactive background removal for sticker uploads. A saliency model
//! predicts where the subject is, the prediction is thresholded into a binary
//! mask, one connected region is kept (the one under a user-picked seed, or the
//! largest), its edges are feathered and the result is composited into a
//! transparent PNG.
//!
//! ## Features
//!
//! - **Seeded Selection**: keep the region under a press on the displayed image
//! - **Multiple Backends**: Tract (pure Rust, default) and ONNX Runtime
//! - **Memoized Sessions**: the model is loaded once per remover and shared by
//!   concurrent requests
//! - **Model Management**: automatic download, SHA-256 check and caching
//! - **Seed Picking**: state machine and marker overlay for interactive frontends
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sticker_bgremove::{
//!     BackgroundRemover, DisplayPoint, DisplaySize, ImageSource, RemovalConfig, SeedRequest,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let remover = BackgroundRemover::new(RemovalConfig::default())?;
//!
//! // The user pressed at (120, 80) on a 400x300 preview
//! let seed = SeedRequest::Display {
//!     point: DisplayPoint::new(120.0, 80.0),
//!     display: DisplaySize::new(400.0, 300.0),
//! };
//! let result = remover
//!     .remove_background(&ImageSource::Path("cat.jpg".into()), Some(seed))
//!     .await?;
//! result.save_png("cat-nobg.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Editing Sessions
//!
//! [`EditingSession`] wraps an upload with its seed picker. A successful
//! [`EditingSession::apply`] swaps the upload for the cutout; a failed one
//! leaves it untouched and records a user-facing message.
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust backend
//! - `onnx`: ONNX Runtime backend with GPU execution providers
//! - `cli` (default): Command-line interface and tracing subscriber setup
//! - `tracing-json`: JSON log output for the CLI
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! sticker-bgremove = { version = "0.1", default-features = false, features = ["tract"] }
//! ```

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod download;
pub mod editing;
pub mod error;
pub mod feather;
pub mod inference;
pub mod loader;
pub mod mask;
pub mod models;
pub mod processor;
pub mod region;
pub mod seed;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::*;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use compositor::{output_file_name, Compositor, OUTPUT_SUFFIX};
pub use config::{BackendKind, ExecutionProvider, RemovalConfig, RemovalConfigBuilder};
pub use download::ModelDownloader;
pub use editing::EditingSession;
pub use error::{BgRemovalError, Result};
pub use feather::feather_mask;
pub use inference::{
    wait_for_runtime, LinkedRuntime, RuntimeProbe, SaliencyBackend, SessionLoader,
    SessionProvider, SessionStatus,
};
pub use loader::{ImageLoader, ImageSource};
pub use mask::{BinaryMask, MaskBuilder, SaliencyMap};
pub use models::{ModelResolver, ModelSource, DEFAULT_INPUT_SIZE, DEFAULT_MODEL_URL};
pub use processor::{
    BackendFactory, BackgroundRemover, DefaultBackendFactory, RefinedMask, SeedRequest,
};
pub use region::{Component, RegionSelector, SeedPoint};
pub use seed::{
    map_display_to_working, DisplayPoint, DisplaySize, OverlaySurface, PickerState, SeedPicker,
};
pub use services::{
    NoOpProgressReporter, ProcessingStage, ProgressReporter, ProgressTracker, ProgressUpdate,
    TracingProgressReporter,
};
pub use types::{CutoutResult, MaskStatistics, ProcessingMetadata, ProcessingTimings};
pub use utils::{working_dimensions, SaliencyPreprocessor, TensorValidator};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background of encoded image bytes
///
/// Suited to uploads held in memory. A fresh [`BackgroundRemover`] is created
/// per call, so the model session is not shared between calls; keep a
/// remover around when processing more than one image.
///
/// # Examples
///
/// ```rust,no_run
/// use sticker_bgremove::{remove_background_from_bytes, RemovalConfig};
///
/// # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = RemovalConfig::builder().feather_radius(2).build()?;
/// let result = remove_background_from_bytes(&upload, &config, None).await?;
/// std::fs::write("sticker.png", &result.png)?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_bytes(
    image_bytes: &[u8],
    config: &RemovalConfig,
    seed: Option<SeedRequest>,
) -> Result<CutoutResult> {
    let remover = BackgroundRemover::new(config.clone())?;
    remover
        .remove_background(&ImageSource::Bytes(image_bytes.to_vec()), seed)
        .await
}

/// Remove the background of an image read from an async stream
///
/// # Examples
///
/// ```rust,no_run
/// use sticker_bgremove::{remove_background_from_reader, RemovalConfig};
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let file = File::open("input.jpg").await?;
/// let result = remove_background_from_reader(file, &RemovalConfig::default(), None).await?;
/// result.save_png("output.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn remove_background_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &RemovalConfig,
    seed: Option<SeedRequest>,
) -> Result<CutoutResult> {
    let image = ImageLoader::load_from_reader(reader).await?;
    let remover = BackgroundRemover::new(config.clone())?;
    remover.process_image(&image, seed).await
}

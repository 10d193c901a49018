//! Result and metadata types for background removal runs

use crate::error::{BgRemovalError, Result};
use crate::mask::BinaryMask;
use crate::region::SeedPoint;
use chrono::{DateTime, Utc};
use image::{GrayImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Result of a background removal run
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// Working-resolution image with the background made transparent
    pub image: RgbaImage,

    /// PNG encoding of `image`
    pub png: Vec<u8>,

    /// Selected foreground region before feathering
    pub mask: BinaryMask,

    /// Feathered alpha channel applied to `image`
    pub alpha: GrayImage,

    /// Dimensions of the decoded input before bounding to the working size
    pub original_dimensions: (u32, u32),

    /// Processing metadata
    pub metadata: ProcessingMetadata,
}

impl CutoutResult {
    /// Working resolution of the output
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Write the encoded PNG to `path`
    ///
    /// # Errors
    /// - File system errors
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, &self.png)
            .map_err(|e| BgRemovalError::file_io_error("write cutout", path, &e))?;
        log::info!("Saved cutout to {}", path.display());
        Ok(())
    }

    /// Write the selected region as a black/white PNG
    ///
    /// # Errors
    /// - `Encode` or file system errors
    pub fn save_mask<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.mask
            .to_gray_image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| BgRemovalError::encode(format!("failed to save mask: {e}")))
    }

    #[must_use]
    pub fn mask_statistics(&self) -> MaskStatistics {
        MaskStatistics::from_mask(&self.mask)
    }
}

/// Foreground/background pixel counts of a mask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
}

impl MaskStatistics {
    #[must_use]
    pub fn from_mask(mask: &BinaryMask) -> Self {
        let total_pixels = mask.as_slice().len();
        let foreground_pixels = mask.foreground_count();
        let foreground_ratio = if total_pixels == 0 {
            0.0
        } else {
            foreground_pixels as f32 / total_pixels as f32
        };
        Self {
            total_pixels,
            foreground_pixels,
            background_pixels: total_pixels - foreground_pixels,
            foreground_ratio,
        }
    }
}

/// Detailed timing breakdown for a removal run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Waiting for the runtime and creating the session (first run only)
    pub model_load_ms: u64,

    /// Image loading and decoding
    pub image_decode_ms: u64,

    /// Working-size resample and tensor conversion
    pub preprocessing_ms: u64,

    /// Model inference
    pub inference_ms: u64,

    /// Mask building, region selection and feathering
    pub mask_refinement_ms: u64,

    /// Alpha compositing and PNG encoding
    pub compositing_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of the total spent in inference
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }

    /// Time not attributed to any measured phase
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.model_load_ms
            + self.image_decode_ms
            + self.preprocessing_ms
            + self.inference_ms
            + self.mask_refinement_ms
            + self.compositing_ms;
        self.total_ms.saturating_sub(measured)
    }
}

/// Metadata about a removal run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    /// Detailed timing breakdown
    pub timings: ProcessingTimings,

    /// Backend that ran inference
    pub backend: String,

    /// Model artifact
    pub model: String,

    /// Working resolution the mask and output share
    pub working_dimensions: (u32, u32),

    /// Seed used for region selection, in working pixels
    pub seed: Option<SeedPoint>,

    /// Whether the seed selected its region (false means largest-region fallback)
    pub seed_used: bool,

    pub threshold: u8,
    pub feather_radius: u32,

    /// Statistics of the selected region
    pub mask_statistics: MaskStatistics,

    /// When processing finished
    pub processed_at: DateTime<Utc>,
}

impl ProcessingMetadata {
    /// Serialize as pretty JSON
    ///
    /// # Errors
    /// - Serialization failure
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BgRemovalError::invalid_input(format!("failed to serialize metadata: {e}")))
    }
}

//! Alpha compositing and PNG export

use crate::error::{BgRemovalError, Result};
use image::{GrayImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Suffix appended to the stem of exported cutouts
pub const OUTPUT_SUFFIX: &str = "-nobg";

/// Merges color and alpha into the exported cutout
pub struct Compositor;

impl Compositor {
    /// Keep the RGB of `image`, take alpha from `alpha`
    ///
    /// # Errors
    /// - `InvalidInput` when the dimensions differ
    pub fn composite(image: &RgbaImage, alpha: &GrayImage) -> Result<RgbaImage> {
        if image.dimensions() != alpha.dimensions() {
            return Err(BgRemovalError::invalid_input(format!(
                "alpha {}x{} does not match image {}x{}",
                alpha.width(),
                alpha.height(),
                image.width(),
                image.height()
            )));
        }

        let mut out = image.clone();
        for (pixel, a) in out.pixels_mut().zip(alpha.pixels()) {
            pixel.0[3] = a.0[0];
        }
        Ok(out)
    }

    /// Encode as PNG bytes
    ///
    /// # Errors
    /// - `Encode` if the encoder fails
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| BgRemovalError::encode(format!("PNG encoding failed: {e}")))?;
        Ok(bytes)
    }
}

/// File name for an exported cutout: `<stem>-nobg.png`
///
/// The stem falls back to `image` when the original name has none.
#[must_use]
pub fn output_file_name(original_name: Option<&str>) -> String {
    let stem = original_name
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("image");
    format!("{stem}{OUTPUT_SUFFIX}.png")
}

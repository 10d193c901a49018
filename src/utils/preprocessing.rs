//! Image preprocessing for saliency inference
//!
//! Two resampling steps happen before inference: the decoded image is bounded
//! to the working resolution (longest side at most `max_side`), and the working
//! image is stretched to the model's square input and laid out as NCHW `f32`.

use crate::error::{BgRemovalError, Result};
use image::{imageops::FilterType, DynamicImage, RgbaImage};
use ndarray::Array4;

/// Working resolution for an image of `width` x `height`
///
/// The scale never enlarges the image, and each side is at least one pixel.
#[must_use]
pub fn working_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
    let longest = width.max(height).max(1) as f64;
    let scale = (f64::from(max_side) / longest).min(1.0);
    let scaled = |dim: u32| ((f64::from(dim) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Preprocessing steps shared by all saliency backends
pub struct SaliencyPreprocessor;

impl SaliencyPreprocessor {
    /// Resample the decoded image to its working resolution as RGBA
    #[must_use]
    pub fn to_working_image(image: &DynamicImage, max_side: u32) -> RgbaImage {
        let (width, height) = working_dimensions(image.width(), image.height(), max_side);
        let rgba = image.to_rgba8();
        if (width, height) == rgba.dimensions() {
            rgba
        } else {
            image::imageops::resize(&rgba, width, height, FilterType::Triangle)
        }
    }

    /// Build the `[1, 3, size, size]` input tensor with channels in [0, 1]
    ///
    /// # Errors
    /// - Zero input size
    /// - Empty working image
    pub fn to_input_tensor(working: &RgbaImage, input_size: u32) -> Result<Array4<f32>> {
        if input_size == 0 {
            return Err(BgRemovalError::invalid_input("model input size must be non-zero"));
        }
        if working.width() == 0 || working.height() == 0 {
            return Err(BgRemovalError::invalid_input("working image is empty"));
        }

        let resized = image::imageops::resize(working, input_size, input_size, FilterType::Triangle);
        let size = input_size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                if let Some(slot) = tensor.get_mut([0, channel, y, x]) {
                    *slot = f32::from(pixel.0.get(channel).copied().unwrap_or(0)) / 255.0;
                }
            }
        }

        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    #[test]
    fn test_working_dimensions_caps_longest_side() {
        assert_eq!(working_dimensions(2560, 1440, 1280), (1280, 720));
        assert_eq!(working_dimensions(1000, 3000, 1280), (427, 1280));
    }

    #[test]
    fn test_working_dimensions_never_upscales() {
        assert_eq!(working_dimensions(800, 600, 1280), (800, 600));
        assert_eq!(working_dimensions(10_000, 1, 1280), (1280, 1));
    }

    #[test]
    fn test_to_working_image_keeps_small_images() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([1, 2, 3])));
        let working = SaliencyPreprocessor::to_working_image(&image, 1280);
        assert_eq!(working.dimensions(), (64, 32));
        assert_eq!(working.get_pixel(5, 5), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_input_tensor_layout_and_range() {
        let working = RgbaImage::from_pixel(50, 80, Rgba([255, 0, 51, 255]));
        let tensor = SaliencyPreprocessor::to_input_tensor(&working, 320).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);
        assert!((tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!(tensor[[0, 1, 10, 10]].abs() < 1e-6);
        assert!((tensor[[0, 2, 319, 319]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_zero_input_size_rejected() {
        let working = RgbaImage::new(4, 4);
        assert!(SaliencyPreprocessor::to_input_tensor(&working, 0).is_err());
    }
}

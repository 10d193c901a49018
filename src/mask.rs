//! Saliency maps and binary foreground masks
//!
//! The model's saliency output lives in its own coordinate space (e.g.
//! 320x320). `MaskBuilder` turns it into grayscale, resamples it to the working
//! resolution and thresholds it, so the resulting `BinaryMask` always matches
//! the working image pixel for pixel.

use crate::error::{BgRemovalError, Result};
use image::{imageops::FilterType, GrayImage, Luma};
use ndarray::Array4;

/// Single-channel model output at model resolution
#[derive(Debug, Clone, PartialEq)]
pub struct SaliencyMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl SaliencyMap {
    /// Wrap a row-major saliency plane
    ///
    /// # Errors
    /// - `InvalidInput` if `data.len() != width * height`
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(BgRemovalError::invalid_input(format!(
                "saliency map of {width}x{height} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Take the first batch, first channel plane of a `[N, C, H, W]` tensor
    ///
    /// # Errors
    /// - `Inference` if the tensor has no batch, channel or pixels
    pub fn from_tensor(tensor: &Array4<f32>) -> Result<Self> {
        let (batch, channels, height, width) = tensor.dim();
        if batch == 0 || channels == 0 || height == 0 || width == 0 {
            return Err(BgRemovalError::inference(format!(
                "saliency tensor {:?} has no data",
                tensor.shape()
            )));
        }
        let plane = tensor.slice(ndarray::s![0, 0, .., ..]);
        Ok(Self {
            width: width as u32,
            height: height as u32,
            data: plane.iter().copied().collect(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Clamp to [0, 1] and scale to an 8-bit grayscale image
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            let index = y as usize * self.width as usize + x as usize;
            let value = self.data.get(index).copied().unwrap_or(0.0);
            let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
            Luma([(value * 255.0).round() as u8])
        })
    }
}

/// Foreground mask at working resolution, one byte per pixel (0 or 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    /// All-background mask
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Build from row-major values; any non-zero value counts as foreground
    ///
    /// # Errors
    /// - `InvalidInput` if `data.len() != width * height`
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(BgRemovalError::invalid_input(format!(
                "mask of {width}x{height} needs {expected} values, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into_iter().map(|v| u8::from(v != 0)).collect(),
        })
    }

    /// Threshold a grayscale image: `value >= threshold` is foreground
    #[must_use]
    pub fn binarize_gray(gray: &GrayImage, threshold: u8) -> Self {
        Self {
            width: gray.width(),
            height: gray.height(),
            data: gray.as_raw().iter().map(|&v| u8::from(v >= threshold)).collect(),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Row-major 0/1 values
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Whether `(x, y)` is inside the mask
    #[must_use]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.width) && y < i64::from(self.height)
    }

    /// Foreground test; out-of-bounds pixels are background
    #[must_use]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.data.get(self.index(x, y)) == Some(&1)
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            if let Some(slot) = self.data.get_mut(index) {
                *slot = u8::from(foreground);
            }
        }
    }

    #[must_use]
    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }

    /// Render as a 0/255 grayscale image
    #[must_use]
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.is_foreground(x, y) { 255 } else { 0 }])
        })
    }
}

/// Turns model saliency into a working-resolution binary mask
pub struct MaskBuilder;

impl MaskBuilder {
    /// Grayscale, resample to `working_width` x `working_height`, then threshold
    #[must_use]
    pub fn build(
        saliency: &SaliencyMap,
        working_width: u32,
        working_height: u32,
        threshold: u8,
    ) -> BinaryMask {
        let gray = saliency.to_gray();
        let resampled = if gray.dimensions() == (working_width, working_height) {
            gray
        } else {
            image::imageops::resize(&gray, working_width, working_height, FilterType::Triangle)
        };
        BinaryMask::binarize_gray(&resampled, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saliency_map_rejects_wrong_length() {
        let err = SaliencyMap::new(3, 3, vec![0.0; 8]).unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidInput(_)));
    }

    #[test]
    fn test_saliency_values_are_clamped() {
        let map = SaliencyMap::new(4, 1, vec![-0.5, 0.5, 1.0, 7.0]).unwrap();
        let gray = map.to_gray();
        assert_eq!(gray.as_raw(), &vec![0, 128, 255, 255]);
    }

    #[test]
    fn test_from_tensor_takes_first_plane() {
        let tensor = Array4::from_shape_fn((1, 2, 2, 3), |(_, c, y, x)| {
            if c == 0 {
                (y * 3 + x) as f32
            } else {
                -1.0
            }
        });
        let map = SaliencyMap::from_tensor(&tensor).unwrap();
        assert_eq!((map.width(), map.height()), (3, 2));
        assert_eq!(map.data, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let gray = GrayImage::from_raw(3, 1, vec![127, 128, 200]).unwrap();
        let mask = BinaryMask::binarize_gray(&gray, 128);
        assert_eq!(mask.as_slice(), &[0, 1, 1]);
    }

    #[test]
    fn test_threshold_idempotence() {
        let map = SaliencyMap::new(
            4,
            4,
            vec![
                0.1, 0.9, 0.9, 0.1, //
                0.2, 0.6, 0.4, 0.0, //
                1.0, 0.5, 0.49, 0.3, //
                0.0, 0.0, 0.8, 0.7,
            ],
        )
        .unwrap();
        let mask = MaskBuilder::build(&map, 4, 4, 128);

        let again = BinaryMask::binarize_gray(&mask.to_gray_image(), 128);
        assert_eq!(again, mask);
    }

    #[test]
    fn test_build_resamples_to_working_size() {
        let map = SaliencyMap::new(2, 2, vec![1.0; 4]).unwrap();
        let mask = MaskBuilder::build(&map, 9, 5, 128);
        assert_eq!(mask.dimensions(), (9, 5));
        assert_eq!(mask.foreground_count(), 45);
    }

    #[test]
    fn test_out_of_bounds_is_background() {
        let mut mask = BinaryMask::new(2, 2);
        mask.set(1, 1, true);
        mask.set(5, 5, true);
        assert!(mask.is_foreground(1, 1));
        assert!(!mask.is_foreground(5, 5));
        assert!(!mask.contains(-1, 0));
        assert_eq!(mask.foreground_count(), 1);
    }
}

//! Edge feathering of binary masks into soft alpha

use crate::mask::BinaryMask;
use image::GrayImage;

/// Soften mask edges with `radius` passes of a separable 3-tap box blur
///
/// Each pass averages horizontally, then vertically, over in-bounds neighbours
/// only, truncating to an integer. Radius 0 yields the plain 0/255 alpha.
#[must_use]
pub fn feather_mask(mask: &BinaryMask, radius: u32) -> GrayImage {
    let hard = mask.to_gray_image();
    if radius == 0 {
        return hard;
    }

    let (width, height) = (mask.width() as usize, mask.height() as usize);
    let mut alpha = hard.into_raw();
    let mut scratch = vec![0u8; alpha.len()];

    for _ in 0..radius {
        blur_rows(&alpha, &mut scratch, width, height);
        blur_columns(&scratch, &mut alpha, width, height);
    }

    GrayImage::from_raw(mask.width(), mask.height(), alpha)
        .unwrap_or_else(|| GrayImage::new(mask.width(), mask.height()))
}

/// Mean of the in-bounds taps around `center` along a line of `len` samples
fn clamped_mean(len: usize, center: usize, sample: impl Fn(usize) -> u8) -> u8 {
    let lo = center.saturating_sub(1);
    let hi = (center + 1).min(len - 1);
    let sum: u32 = (lo..=hi).map(|i| u32::from(sample(i))).sum();
    (sum / (hi - lo + 1) as u32) as u8
}

fn blur_rows(input: &[u8], out: &mut [u8], width: usize, height: usize) {
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let value = clamped_mean(width, x, |i| input.get(row + i).copied().unwrap_or(0));
            if let Some(slot) = out.get_mut(row + x) {
                *slot = value;
            }
        }
    }
}

fn blur_columns(input: &[u8], out: &mut [u8], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            let value = clamped_mean(height, y, |i| input.get(i * width + x).copied().unwrap_or(0));
            if let Some(slot) = out.get_mut(y * width + x) {
                *slot = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_mask(size: u32, start: u32, side: u32) -> BinaryMask {
        let mut mask = BinaryMask::new(size, size);
        for y in start..start + side {
            for x in start..start + side {
                mask.set(x, y, true);
            }
        }
        mask
    }

    #[test]
    fn test_radius_zero_is_hard_alpha() {
        let mask = square_mask(6, 1, 3);
        let alpha = feather_mask(&mask, 0);
        assert_eq!(alpha, mask.to_gray_image());
    }

    #[test]
    fn test_interior_and_exterior_are_preserved() {
        let mask = square_mask(20, 5, 10);
        let alpha = feather_mask(&mask, 2);

        // At least `radius` pixels from the edge on both sides
        for y in 7..13 {
            for x in 7..13 {
                assert_eq!(alpha.get_pixel(x, y).0[0], 255, "interior ({x}, {y})");
            }
        }
        assert_eq!(alpha.get_pixel(0, 0).0[0], 0);
        assert_eq!(alpha.get_pixel(2, 10).0[0], 0);
    }

    #[test]
    fn test_edges_become_soft() {
        let mask = square_mask(20, 5, 10);
        let alpha = feather_mask(&mask, 2);

        let edge = alpha.get_pixel(5, 10).0[0];
        let outside = alpha.get_pixel(4, 10).0[0];
        assert!(edge > 0 && edge < 255, "edge alpha {edge}");
        assert!(outside > 0 && outside < edge, "outside alpha {outside}");
    }

    #[test]
    fn test_image_border_uses_clamped_kernel() {
        let mut mask = BinaryMask::new(5, 5);
        for y in 0..5 {
            for x in 0..5 {
                mask.set(x, y, true);
            }
        }
        let alpha = feather_mask(&mask, 3);
        assert!(alpha.as_raw().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_single_pass_values() {
        // One foreground pixel in a 1-row image: horizontal mean only
        let mask = BinaryMask::from_raw(3, 1, vec![0, 1, 0]).unwrap();
        let alpha = feather_mask(&mask, 1);
        // x=0: (0 + 255) / 2, x=1: 255 / 3, x=2: (255 + 0) / 2
        assert_eq!(alpha.as_raw(), &vec![127, 85, 127]);
    }
}

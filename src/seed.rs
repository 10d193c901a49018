//! Interactive seed capture
//!
//! The user picks the subject by pressing on the displayed image. The press
//! arrives in display coordinates (CSS pixels relative to the shown image) and
//! is mapped to the working resolution before region selection. A marker is
//! drawn on a transparent overlay at the pressed point.

use crate::error::{BgRemovalError, Result};
use crate::region::SeedPoint;
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Marker radius in display pixels
pub const MARKER_RADIUS: f64 = 8.0;
/// Marker outline width in display pixels
pub const MARKER_STROKE: f64 = 2.0;
/// Marker fill, rgba(0, 150, 255, 0.8)
pub const MARKER_FILL: Rgba<u8> = Rgba([0, 150, 255, 204]);
/// Marker outline color
pub const MARKER_OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Upper bound on the overlay's device pixel ratio
pub const MAX_DEVICE_PIXEL_RATIO: f64 = 2.0;

/// Pointer position relative to the displayed image's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub x: f64,
    pub y: f64,
}

impl DisplayPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// On-screen size of the displayed image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: f64,
    pub height: f64,
}

impl DisplaySize {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Map a display-space point to working-resolution pixels
///
/// # Errors
/// - `InvalidInput` if the display size is not positive
pub fn map_display_to_working(
    point: DisplayPoint,
    display: DisplaySize,
    working_width: u32,
    working_height: u32,
) -> Result<SeedPoint> {
    if !(display.width > 0.0 && display.height > 0.0) {
        return Err(BgRemovalError::invalid_input(format!(
            "display size {}x{} must be positive",
            display.width, display.height
        )));
    }
    let x = (point.x / display.width * f64::from(working_width)).round();
    let y = (point.y / display.height * f64::from(working_height)).round();
    Ok(SeedPoint::new(x as i64, y as i64))
}

/// Seed picking state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PickerState {
    /// Not picking; presses are ignored
    #[default]
    Idle,
    /// Waiting for a press on the subject
    Picking,
    /// A seed has been placed; further presses move it
    Seeded(DisplayPoint),
}

/// Pointer-driven seed picking state machine
#[derive(Debug, Clone, Default)]
pub struct SeedPicker {
    state: PickerState,
}

impl SeedPicker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> PickerState {
        self.state
    }

    /// Pending seed, if one has been placed
    #[must_use]
    pub fn seed(&self) -> Option<DisplayPoint> {
        match self.state {
            PickerState::Seeded(point) => Some(point),
            PickerState::Idle | PickerState::Picking => None,
        }
    }

    #[must_use]
    pub fn is_picking(&self) -> bool {
        !matches!(self.state, PickerState::Idle)
    }

    /// Enter picking mode; an existing seed is kept
    pub fn begin_picking(&mut self) {
        if self.state == PickerState::Idle {
            self.state = PickerState::Picking;
        }
    }

    /// Record a press; returns whether it was accepted
    pub fn pointer_down(&mut self, point: DisplayPoint) -> bool {
        match self.state {
            PickerState::Idle => false,
            PickerState::Picking | PickerState::Seeded(_) => {
                self.state = PickerState::Seeded(point);
                true
            },
        }
    }

    /// Drop the seed but stay in picking mode
    pub fn clear(&mut self) {
        if self.is_picking() {
            self.state = PickerState::Picking;
        }
    }

    /// Leave picking mode, discarding any seed
    pub fn cancel(&mut self) {
        self.state = PickerState::Idle;
    }

    /// Hand the pending seed to a removal run and return to idle
    pub fn take_for_apply(&mut self) -> Option<DisplayPoint> {
        let seed = self.seed();
        self.state = PickerState::Idle;
        seed
    }

    /// A new image was chosen; any seed belongs to the old one
    pub fn reset_for_new_image(&mut self) {
        self.state = PickerState::Idle;
    }
}

/// Transparent overlay the seed marker is drawn on
///
/// Backing pixels are the wrapper size times the device pixel ratio, with the
/// ratio capped and each side at least one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlaySurface {
    display: DisplaySize,
    pixel_ratio: f64,
    width: u32,
    height: u32,
}

impl OverlaySurface {
    #[must_use]
    pub fn new(display: DisplaySize, device_pixel_ratio: f64) -> Self {
        let pixel_ratio = if device_pixel_ratio > 0.0 {
            device_pixel_ratio.min(MAX_DEVICE_PIXEL_RATIO)
        } else {
            1.0
        };
        let backing = |css: f64| (css * pixel_ratio).floor().max(1.0) as u32;
        Self {
            display,
            pixel_ratio,
            width: backing(display.width),
            height: backing(display.height),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[must_use]
    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    #[must_use]
    pub fn display(&self) -> DisplaySize {
        self.display
    }

    /// Clear the overlay and draw the marker at `marker`, if any
    #[must_use]
    pub fn render(&self, marker: Option<DisplayPoint>) -> RgbaImage {
        let mut canvas = RgbaImage::new(self.width, self.height);
        let Some(point) = marker else {
            return canvas;
        };

        let ratio = self.pixel_ratio;
        let (cx, cy) = (point.x * ratio, point.y * ratio);
        let outer = (MARKER_RADIUS + MARKER_STROKE / 2.0) * ratio;
        let inner = (MARKER_RADIUS - MARKER_STROKE / 2.0) * ratio;

        let x_range = pixel_span(cx, outer, self.width);
        let y_range = pixel_span(cy, outer, self.height);
        for y in y_range {
            for x in x_range.clone() {
                let dx = f64::from(x) + 0.5 - cx;
                let dy = f64::from(y) + 0.5 - cy;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance > outer {
                    continue;
                }
                let color = if distance >= inner {
                    MARKER_OUTLINE
                } else {
                    MARKER_FILL
                };
                canvas.put_pixel(x, y, color);
            }
        }
        canvas
    }
}

/// Pixel indices within `reach` of `center`, clipped to `0..limit`
fn pixel_span(center: f64, reach: f64, limit: u32) -> std::ops::Range<u32> {
    let start = (center - reach).floor().max(0.0) as u32;
    let end = ((center + reach).ceil().max(0.0) as u32).min(limit);
    start.min(end)..end
}

//! Connected-region selection on binary masks
//!
//! Regions are 8-connected. With a usable seed the region containing it is
//! kept; otherwise the largest region wins, ties going to whichever is met
//! first in row-major order. Flood fills run off an explicit queue sized to the
//! pixel count, so large masks never recurse.

use crate::mask::BinaryMask;
use serde::{Deserialize, Serialize};

/// Seed location in working-resolution pixels
///
/// Signed so that points outside the image can be represented and rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeedPoint {
    pub x: i64,
    pub y: i64,
}

impl SeedPoint {
    #[must_use]
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// A connected foreground component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    /// First pixel of the component in row-major order
    pub x: u32,
    pub y: u32,
    /// Pixel count
    pub size: usize,
}

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// FIFO of pixel coordinates backed by parallel arrays
///
/// Each pixel is pushed at most once per fill, so capacity equal to the pixel
/// count is enough and the queue never reallocates.
#[derive(Debug)]
pub struct FloodQueue {
    xs: Vec<u32>,
    ys: Vec<u32>,
    head: usize,
}

impl FloodQueue {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            xs: Vec::with_capacity(capacity),
            ys: Vec::with_capacity(capacity),
            head: 0,
        }
    }

    pub fn push(&mut self, x: u32, y: u32) {
        self.xs.push(x);
        self.ys.push(y);
    }

    pub fn pop(&mut self) -> Option<(u32, u32)> {
        let x = *self.xs.get(self.head)?;
        let y = *self.ys.get(self.head)?;
        self.head += 1;
        Some((x, y))
    }

    /// Empty the queue, keeping its allocation
    pub fn clear(&mut self) {
        self.xs.clear();
        self.ys.clear();
        self.head = 0;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head >= self.xs.len()
    }
}

/// Picks a single connected region out of a binary mask
pub struct RegionSelector;

impl RegionSelector {
    /// Keep the region under `seed`, or the largest region when the seed is
    /// absent, out of bounds or on background
    ///
    /// A mask with no foreground is returned unchanged.
    #[must_use]
    pub fn select(mask: &BinaryMask, seed: Option<SeedPoint>) -> BinaryMask {
        if let Some(seed) = seed.and_then(|s| Self::usable_seed(mask, s)) {
            tracing::debug!(x = seed.0, y = seed.1, "Selecting region under seed");
            return Self::keep_connected(mask, seed.0, seed.1);
        }

        match Self::largest_component(mask) {
            Some(component) => {
                tracing::debug!(
                    x = component.x,
                    y = component.y,
                    size = component.size,
                    "Selecting largest region"
                );
                Self::keep_connected(mask, component.x, component.y)
            },
            None => mask.clone(),
        }
    }

    /// Every component with its first pixel and size, in row-major discovery order
    #[must_use]
    pub fn components(mask: &BinaryMask) -> Vec<Component> {
        let (width, height) = mask.dimensions();
        let mut visited = vec![false; mask.as_slice().len()];
        let mut queue = FloodQueue::with_capacity(visited.len());
        let mut components = Vec::new();

        for y in 0..height {
            for x in 0..width {
                let index = mask.index(x, y);
                if !mask.is_foreground(x, y) || visited.get(index) != Some(&false) {
                    continue;
                }
                queue.clear();
                let size = Self::flood(mask, x, y, &mut visited, &mut queue);
                components.push(Component { x, y, size });
            }
        }
        components
    }

    /// Whether `seed` lies on foreground inside the mask, i.e. `select` will
    /// honour it instead of falling back to the largest region
    #[must_use]
    pub fn seed_hits(mask: &BinaryMask, seed: SeedPoint) -> bool {
        Self::usable_seed(mask, seed).is_some()
    }

    fn usable_seed(mask: &BinaryMask, seed: SeedPoint) -> Option<(u32, u32)> {
        if !mask.contains(seed.x, seed.y) {
            return None;
        }
        let (x, y) = (seed.x as u32, seed.y as u32);
        mask.is_foreground(x, y).then_some((x, y))
    }

    fn largest_component(mask: &BinaryMask) -> Option<Component> {
        let mut best: Option<Component> = None;
        for component in Self::components(mask) {
            if best.map_or(true, |b| component.size > b.size) {
                best = Some(component);
            }
        }
        best
    }

    /// Mask containing exactly the foreground reachable from `(x, y)`
    fn keep_connected(mask: &BinaryMask, x: u32, y: u32) -> BinaryMask {
        let mut visited = vec![false; mask.as_slice().len()];
        let mut queue = FloodQueue::with_capacity(visited.len());
        Self::flood(mask, x, y, &mut visited, &mut queue);

        let mut out = BinaryMask::new(mask.width(), mask.height());
        for py in 0..mask.height() {
            for px in 0..mask.width() {
                if visited.get(mask.index(px, py)) == Some(&true) {
                    out.set(px, py, true);
                }
            }
        }
        out
    }

    /// Breadth-first fill from a foreground pixel, marking `visited`; returns the size
    fn flood(
        mask: &BinaryMask,
        x: u32,
        y: u32,
        visited: &mut [bool],
        queue: &mut FloodQueue,
    ) -> usize {
        let Some(slot) = visited.get_mut(mask.index(x, y)) else {
            return 0;
        };
        *slot = true;
        queue.push(x, y);

        let mut size = 0;
        while let Some((cx, cy)) = queue.pop() {
            size += 1;
            for (dx, dy) in NEIGHBOURS {
                let (nx, ny) = (i64::from(cx) + dx, i64::from(cy) + dy);
                if !mask.contains(nx, ny) {
                    continue;
                }
                let (nx, ny) = (nx as u32, ny as u32);
                if !mask.is_foreground(nx, ny) {
                    continue;
                }
                if let Some(seen) = visited.get_mut(mask.index(nx, ny)) {
                    if !*seen {
                        *seen = true;
                        queue.push(nx, ny);
                    }
                }
            }
        }
        size
    }
}

//! Tiled, clip-limited histogram equalization (CLAHE-style).
//!
//! The image is cut into non-overlapping `block_size` squares (partial
//! at the right and bottom edges). Each tile builds a luminance
//! histogram, clips tall bins at `clip_limit * pixels / 256`, spreads the
//! clipped excess evenly over all bins and equalizes its own pixels with
//! the resulting CDF.
//!
//! Tiles are independent and are not blended, so strongly differing
//! neighbors can show a visible seam.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raster::{CHANNELS, clamp_to_u8, luminance};
use crate::types::RgbaImage;

/// Local contrast parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalContrastParams {
    /// Tile edge length in pixels.
    pub block_size: u32,
    /// Bin height cap as a multiple of the uniform bin height.
    pub clip_limit: f64,
}

impl Default for LocalContrastParams {
    fn default() -> Self {
        Self {
            block_size: 64,
            clip_limit: 3.0,
        }
    }
}

/// A rectangular tile, half-open on the right and bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Left column.
    pub x0: u32,
    /// Top row.
    pub y0: u32,
    /// One past the right column.
    pub x1: u32,
    /// One past the bottom row.
    pub y1: u32,
}

impl Tile {
    /// Number of pixels covered.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        (self.x1 - self.x0) as u64 * (self.y1 - self.y0) as u64
    }
}

/// Tiles covering a `width` x `height` image, row by row.
///
/// Every tile starts at a multiple of `block_size`; the last tile in a
/// row or column is truncated at the image edge.
#[must_use]
pub fn tiles(width: u32, height: u32, block_size: u32) -> Vec<Tile> {
    let block = block_size.max(1);
    (0..height)
        .step_by(block as usize)
        .flat_map(|y0| {
            (0..width).step_by(block as usize).map(move |x0| Tile {
                x0,
                y0,
                x1: x0.saturating_add(block).min(width),
                y1: y0.saturating_add(block).min(height),
            })
        })
        .collect()
}

/// Clip `histogram` at `clip_limit * pixel_count / 256` and redistribute
/// the excess uniformly; the returned bins still sum to `pixel_count`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn clip_histogram(histogram: &[u32; 256], pixel_count: u64, clip_limit: f64) -> [f64; 256] {
    let clip_value = clip_limit * pixel_count as f64 / 256.0;
    let mut excess = 0.0;
    let mut clipped = histogram.map(|count| {
        let count = f64::from(count);
        if count > clip_value {
            excess += count - clip_value;
            clip_value
        } else {
            count
        }
    });
    let share = excess / 256.0;
    for bin in &mut clipped {
        *bin += share;
    }
    clipped
}

/// Equalization lookup table for one tile: `CDF[v] / pixel_count * 255`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn equalization_lut(histogram: &[u32; 256], pixel_count: u64, clip_limit: f64) -> [u8; 256] {
    let clipped = clip_histogram(histogram, pixel_count, clip_limit);
    let total = pixel_count as f64;
    let mut cdf = 0.0;
    clipped.map(|bin| {
        cdf += bin;
        clamp_to_u8(cdf / total * 255.0)
    })
}

/// Equalize `image` tile by tile, in place; alpha untouched.
pub fn enhance_local_contrast(image: &mut RgbaImage, params: LocalContrastParams) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let block = params.block_size.max(1);
    let stride = w as usize * CHANNELS;
    let band_len = stride * block as usize;
    let buf: &mut [u8] = image;

    // Each band is one row of tiles; bands are disjoint slices.
    buf.par_chunks_mut(band_len).for_each(|band| {
        let band_rows = u32::try_from(band.len() / stride).unwrap_or(block);
        for tile in tiles(w, band_rows, block) {
            equalize_tile(band, stride, tile, params.clip_limit);
        }
    });
}

fn equalize_tile(band: &mut [u8], stride: usize, tile: Tile, clip_limit: f64) {
    let columns = tile.x0 as usize * CHANNELS..tile.x1 as usize * CHANNELS;
    let rows = tile.y0 as usize..tile.y1 as usize;

    let mut histogram = [0u32; 256];
    for y in rows.clone() {
        for px in band[y * stride..][columns.clone()].chunks_exact(CHANNELS) {
            histogram[usize::from(luminance(px[0], px[1], px[2]))] += 1;
        }
    }

    let lut = equalization_lut(&histogram, tile.pixel_count(), clip_limit);
    for y in rows {
        for px in band[y * stride..][columns.clone()].chunks_exact_mut(CHANNELS) {
            for c in &mut px[..3] {
                *c = lut[usize::from(*c)];
            }
        }
    }
}

//! Edge-preserving bilateral denoise.
//!
//! Each RGB sample becomes a weighted mean of its square neighborhood,
//! where a neighbor's weight is the product of a spatial Gaussian (in
//! pixel distance) and a range Gaussian (in that channel's intensity
//! difference from the center sample). Strong edges therefore receive
//! almost no contribution from across the edge.
//!
//! Pixels closer than `radius = ceil(2 * spatial_sigma)` to any border
//! are copied unchanged; only the interior, where the full window fits,
//! is filtered.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raster::{CHANNELS, alloc_raster, clamp_to_u8};
use crate::types::{PipelineError, RgbaImage};

/// Bilateral filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BilateralParams {
    /// Standard deviation of the spatial Gaussian, in pixels.
    pub spatial_sigma: f64,
    /// Standard deviation of the range Gaussian, in 8-bit levels.
    pub intensity_sigma: f64,
}

impl BilateralParams {
    /// Fixed parameters used by the enhancement chain.
    pub const ENHANCE_CHAIN: Self = Self {
        spatial_sigma: 3.0,
        intensity_sigma: 25.0,
    };

    /// Half-width of the filter window.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn radius(self) -> usize {
        if self.spatial_sigma.is_finite() && self.spatial_sigma > 0.0 {
            (self.spatial_sigma * 2.0).ceil() as usize
        } else {
            0
        }
    }
}

/// Apply the bilateral filter to `image`.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the output buffer
/// cannot be allocated.
pub fn bilateral_filter(
    image: &RgbaImage,
    params: BilateralParams,
) -> Result<RgbaImage, PipelineError> {
    let mut out = alloc_raster(image.width(), image.height())?;
    bilateral_filter_into(image, &mut out, params);
    Ok(out)
}

/// Filter `src` into the same-sized `dst`.
pub(crate) fn bilateral_filter_into(src: &RgbaImage, dst: &mut RgbaImage, params: BilateralParams) {
    debug_assert_eq!(src.dimensions(), dst.dimensions());
    dst.copy_from_slice(src);

    let radius = params.radius();
    let (w, h) = (src.width() as usize, src.height() as usize);
    if radius == 0 || params.intensity_sigma <= 0.0 || w <= 2 * radius || h <= 2 * radius {
        return;
    }

    let spatial = spatial_weights(radius, params.spatial_sigma);
    let range = range_weights(params.intensity_sigma);
    let src: &[u8] = src;
    let stride = w * CHANNELS;
    let side = 2 * radius + 1;

    let dst: &mut [u8] = dst;
    dst.par_chunks_mut(stride)
        .enumerate()
        .skip(radius)
        .take(h - 2 * radius)
        .for_each(|(y, out_row)| {
            for x in radius..w - radius {
                let center = &src[y * stride + x * CHANNELS..];
                let mut acc = [0.0f64; 3];
                let mut weight_sum = [0.0f64; 3];
                for dy in 0..side {
                    let row = (y + dy - radius) * stride;
                    let spatial_row = &spatial[dy * side..(dy + 1) * side];
                    for (dx, &ws) in spatial_row.iter().enumerate() {
                        let px = &src[row + (x + dx - radius) * CHANNELS..];
                        for c in 0..3 {
                            let diff = px[c].abs_diff(center[c]);
                            let wt = ws * range[usize::from(diff)];
                            acc[c] = wt.mul_add(f64::from(px[c]), acc[c]);
                            weight_sum[c] += wt;
                        }
                    }
                }
                let o = x * CHANNELS;
                for c in 0..3 {
                    out_row[o + c] = clamp_to_u8(acc[c] / weight_sum[c]);
                }
            }
        });
}

/// `exp(-(dx² + dy²) / (2σ²))` over the `(2r+1)²` window, row-major.
#[allow(clippy::cast_precision_loss)]
fn spatial_weights(radius: usize, sigma: f64) -> Vec<f64> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    let side = 2 * radius + 1;
    let r = radius as f64;
    (0..side * side)
        .map(|i| {
            let dy = (i / side) as f64 - r;
            let dx = (i % side) as f64 - r;
            (-dx.mul_add(dx, dy * dy) / two_sigma_sq).exp()
        })
        .collect()
}

/// `exp(-d² / (2σ²))` for every possible 8-bit difference `d`.
fn range_weights(sigma: f64) -> [f64; 256] {
    let two_sigma_sq = 2.0 * sigma * sigma;
    std::array::from_fn(|d| {
        #[allow(clippy::cast_precision_loss)]
        let d = d as f64;
        (-(d * d) / two_sigma_sq).exp()
    })
}

//! Bicubic resampling by a uniform scale factor.
//!
//! Destination pixel `(x, y)` samples source position `(x / scale,
//! y / scale)` from a 4x4 neighborhood weighted by the Keys cubic
//! convolution kernel with `a = -0.5`. Neighbors outside the image clamp
//! to the nearest edge pixel. All four channels are resampled.
//!
//! At integer source positions the kernel is 1 at the center tap and 0
//! at the others, so `scale = 1` reproduces the source exactly.

use rayon::prelude::*;

use crate::raster::{CHANNELS, alloc_raster, clamp_to_u8};
use crate::types::{PipelineError, RgbaImage};

/// Keys kernel parameter.
const A: f64 = -0.5;

/// Cubic convolution weight for distance `t`.
#[must_use]
pub fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t <= 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// `round(src * scale)` per axis, never below one pixel.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let axis = |n: u32| (f64::from(n) * scale).round().clamp(1.0, f64::from(u32::MAX)) as u32;
    (axis(width), axis(height))
}

/// Scale factor that fits `width` x `height` within `max_dimension` on
/// its longest axis. Returns 1 when it already fits.
#[must_use]
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> f64 {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        1.0
    } else {
        f64::from(max_dimension) / f64::from(longest)
    }
}

/// Resample `image` by `scale`.
///
/// Empty images and non-positive or non-finite scales return a copy of
/// the input.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the destination
/// cannot be allocated.
pub fn resample(image: &RgbaImage, scale: f64) -> Result<RgbaImage, PipelineError> {
    if image.width() == 0 || image.height() == 0 || !scale.is_finite() || scale <= 0.0 {
        return Ok(image.clone());
    }
    let (w, h) = scaled_dimensions(image.width(), image.height(), scale);
    let mut out = alloc_raster(w, h)?;
    resample_into(image, &mut out, scale);
    Ok(out)
}

/// Four source indices and their weights for one destination coordinate.
#[derive(Debug, Clone, Copy)]
struct Taps {
    index: [usize; 4],
    weight: [f64; 4],
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn taps(dst: u32, scale: f64, src_len: u32) -> Vec<Taps> {
    let last = f64::from(src_len.saturating_sub(1));
    (0..dst)
        .map(|d| {
            let pos = f64::from(d) / scale;
            let base = pos.floor();
            let frac = pos - base;
            let mut t = Taps {
                index: [0; 4],
                weight: [0.0; 4],
            };
            for k in 0..4 {
                let offset = k as f64 - 1.0;
                t.index[k] = (base + offset).clamp(0.0, last) as usize;
                t.weight[k] = cubic_weight(frac - offset);
            }
            t
        })
        .collect()
}

/// Resample `src` into `dst`, which must already have the size given by
/// [`scaled_dimensions`] for `scale`.
pub(crate) fn resample_into(src: &RgbaImage, dst: &mut RgbaImage, scale: f64) {
    let columns = taps(dst.width(), scale, src.width());
    let rows = taps(dst.height(), scale, src.height());
    let src_stride = src.width() as usize * CHANNELS;
    let dst_stride = dst.width() as usize * CHANNELS;
    let src: &[u8] = src;
    let dst: &mut [u8] = dst;

    dst.par_chunks_mut(dst_stride)
        .zip(rows.par_iter())
        .for_each(|(out_row, ty)| {
            for (px, tx) in out_row.chunks_exact_mut(CHANNELS).zip(&columns) {
                let mut acc = [0.0f64; CHANNELS];
                for (&sy, &wy) in ty.index.iter().zip(&ty.weight) {
                    let row = &src[sy * src_stride..];
                    for (&sx, &wx) in tx.index.iter().zip(&tx.weight) {
                        let w = wx * wy;
                        let s = &row[sx * CHANNELS..sx * CHANNELS + CHANNELS];
                        for c in 0..CHANNELS {
                            acc[c] = w.mul_add(f64::from(s[c]), acc[c]);
                        }
                    }
                }
                for c in 0..CHANNELS {
                    px[c] = clamp_to_u8(acc[c]);
                }
            }
        });
}

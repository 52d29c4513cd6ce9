//! Separable Gaussian blur over the RGB channels of an RGBA raster.
//!
//! Two passes: horizontal into an `f64` scratch plane, then vertical
//! into the destination. Taps that fall outside the image are dropped
//! and the remaining weights renormalized, so borders keep their own
//! brightness instead of fading toward black.
//!
//! Alpha is copied through unchanged. Rows are processed in parallel;
//! each output row depends only on the input, so the result is the same
//! as a sequential run.

use rayon::prelude::*;

use crate::kernel::Kernel;
use crate::raster::{CHANNELS, alloc_raster, clamp_to_u8, reserve_scratch};
use crate::types::{PipelineError, RgbaImage};

const RGB: usize = 3;

/// Blur an image with the Gaussian kernel for `radius`.
///
/// Non-positive radius values return the image unchanged.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the output or scratch
/// buffers cannot be allocated.
pub fn gaussian_blur(image: &RgbaImage, radius: f64) -> Result<RgbaImage, PipelineError> {
    let mut out = alloc_raster(image.width(), image.height())?;
    let mut scratch = Vec::new();
    gaussian_blur_into(image, &mut out, &mut scratch, radius)?;
    Ok(out)
}

/// Blur `src` into `dst`, reusing `scratch` for the intermediate pass.
///
/// `dst` must have the same dimensions as `src`.
pub(crate) fn gaussian_blur_into(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    scratch: &mut Vec<f64>,
    radius: f64,
) -> Result<(), PipelineError> {
    debug_assert_eq!(src.dimensions(), dst.dimensions());

    let (w, h) = (src.width() as usize, src.height() as usize);
    if w == 0 || h == 0 {
        return Ok(());
    }

    // Taps farther than the image extent are always dropped at the border,
    // so no kernel needs more than 2 * max(w, h) + 1 of them.
    let kernel = Kernel::truncated(radius, 2 * w.max(h) + 1);
    if kernel.is_identity() {
        dst.copy_from_slice(src);
        return Ok(());
    }

    reserve_scratch(scratch, w * h * RGB, src.width(), src.height())?;

    horizontal_pass(src, scratch, w, &kernel);
    vertical_pass(src, scratch, dst, w, h, &kernel);
    Ok(())
}

fn horizontal_pass(src: &RgbaImage, scratch: &mut [f64], w: usize, kernel: &Kernel) {
    let weights = kernel.weights();
    let center = kernel.center();
    let src: &[u8] = src;

    scratch
        .par_chunks_mut(w * RGB)
        .zip(src.par_chunks(w * CHANNELS))
        .for_each(|(out_row, in_row)| {
            for x in 0..w {
                let mut acc = [0.0f64; RGB];
                let mut weight_sum = 0.0;
                // Taps k cover source columns x + k - center.
                let k_start = center.saturating_sub(x);
                let k_end = weights.len().min(w + center - x);
                for k in k_start..k_end {
                    let sx = x + k - center;
                    let wt = weights[k];
                    let px = &in_row[sx * CHANNELS..sx * CHANNELS + RGB];
                    for c in 0..RGB {
                        acc[c] = wt.mul_add(f64::from(px[c]), acc[c]);
                    }
                    weight_sum += wt;
                }
                for c in 0..RGB {
                    out_row[x * RGB + c] = acc[c] / weight_sum;
                }
            }
        });
}

fn vertical_pass(
    src: &RgbaImage,
    scratch: &[f64],
    dst: &mut RgbaImage,
    w: usize,
    h: usize,
    kernel: &Kernel,
) {
    let weights = kernel.weights();
    let center = kernel.center();
    let src: &[u8] = src;
    let row_len = w * RGB;

    let dst: &mut [u8] = dst;
    dst.par_chunks_mut(w * CHANNELS)
        .enumerate()
        .for_each(|(y, out_row)| {
            let k_start = center.saturating_sub(y);
            let k_end = weights.len().min(h + center - y);
            let weight_sum: f64 = weights[k_start..k_end].iter().sum();
            for x in 0..w {
                let mut acc = [0.0f64; RGB];
                for k in k_start..k_end {
                    let sy = y + k - center;
                    let wt = weights[k];
                    let base = sy * row_len + x * RGB;
                    for c in 0..RGB {
                        acc[c] = wt.mul_add(scratch[base + c], acc[c]);
                    }
                }
                let o = x * CHANNELS;
                for c in 0..RGB {
                    out_row[o + c] = clamp_to_u8(acc[c] / weight_sum);
                }
                out_row[o + 3] = src[(y * w + x) * CHANNELS + 3];
            }
        });
}

//! Unsharp masking and high-pass detail boost.
//!
//! Both add back the residual between an image and its Gaussian blur.
//! The unsharp mask gates the residual by a threshold so flat regions
//! stay untouched; the detail enhancer applies it everywhere at a fixed
//! gain.

use serde::{Deserialize, Serialize};

use crate::blur::gaussian_blur_into;
use crate::raster::{CHANNELS, alloc_raster, clamp_to_u8};
use crate::types::{PipelineError, RgbaImage};

/// Parameters of one unsharp-mask pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnsharpParams {
    /// Gain applied to the residual.
    pub amount: f64,
    /// Blur radius used to build the residual.
    pub radius: f64,
    /// Residuals with magnitude at or below this are ignored.
    pub threshold: f64,
}

/// Blur radius used by [`enhance_detail`].
pub const DETAIL_RADIUS: f64 = 2.0;
/// Gain applied to the high-pass residual by [`enhance_detail`].
pub const DETAIL_GAIN: f64 = 0.8;

/// Sharpen `image` with an unsharp mask.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the blur buffers
/// cannot be allocated.
pub fn unsharp_mask(image: &RgbaImage, params: UnsharpParams) -> Result<RgbaImage, PipelineError> {
    let mut out = alloc_raster(image.width(), image.height())?;
    let mut scratch = Vec::new();
    unsharp_mask_into(image, &mut out, &mut scratch, params)?;
    Ok(out)
}

/// Boost high-frequency detail: `original + (original - blur(r=2)) * 0.8`.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the blur buffers
/// cannot be allocated.
pub fn enhance_detail(image: &RgbaImage) -> Result<RgbaImage, PipelineError> {
    let mut out = alloc_raster(image.width(), image.height())?;
    let mut scratch = Vec::new();
    enhance_detail_into(image, &mut out, &mut scratch)?;
    Ok(out)
}

/// Unsharp `src` into `dst`. The blur is written straight into `dst` and
/// then combined with `src` in place, so no third raster is needed.
pub(crate) fn unsharp_mask_into(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    scratch: &mut Vec<f64>,
    params: UnsharpParams,
) -> Result<(), PipelineError> {
    gaussian_blur_into(src, dst, scratch, params.radius)?;
    combine_residual(src, dst, |original, diff| {
        if diff.abs() > params.threshold {
            diff.mul_add(params.amount, original)
        } else {
            original
        }
    });
    Ok(())
}

pub(crate) fn enhance_detail_into(
    src: &RgbaImage,
    dst: &mut RgbaImage,
    scratch: &mut Vec<f64>,
) -> Result<(), PipelineError> {
    gaussian_blur_into(src, dst, scratch, DETAIL_RADIUS)?;
    combine_residual(src, dst, |original, diff| {
        diff.mul_add(DETAIL_GAIN, original)
    });
    Ok(())
}

/// Replace each blurred RGB sample in `blurred` with
/// `f(original, original - blurred)`; alpha is restored from `original`.
fn combine_residual(original: &RgbaImage, blurred: &mut RgbaImage, f: impl Fn(f64, f64) -> f64) {
    let original: &[u8] = original;
    let blurred: &mut [u8] = blurred;
    for (o_px, b_px) in original
        .chunks_exact(CHANNELS)
        .zip(blurred.chunks_exact_mut(CHANNELS))
    {
        for c in 0..3 {
            let o = f64::from(o_px[c]);
            let diff = o - f64::from(b_px[c]);
            b_px[c] = clamp_to_u8(f(o, diff));
        }
        b_px[3] = o_px[3];
    }
}

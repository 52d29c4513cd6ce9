//! Raster buffer plumbing shared by the filters.
//!
//! Allocation goes through [`alloc_raster`] so that oversized images turn
//! into [`PipelineError::ResourceExhausted`] instead of an abort.
//! [`Workspace`] owns the two ping-pong buffers a pipeline run cycles
//! through, plus the `f64` scratch plane used by the separable blur.

use crate::types::{PipelineError, RgbaImage};

/// Bytes per RGBA pixel.
pub const CHANNELS: usize = 4;

/// Round and clamp a channel value into `0..=255`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_to_u8(v: f64) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

/// Rec. 601 luma of an 8-bit RGB triple, rounded to the nearest bin.
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    clamp_to_u8(0.114f64.mul_add(
        f64::from(b),
        0.299f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
    ))
}

/// Allocate a zeroed raster, failing gracefully when memory is short.
///
/// # Errors
///
/// Returns [`PipelineError::ResourceExhausted`] if the byte count
/// overflows `usize` or cannot be reserved.
pub fn alloc_raster(width: u32, height: u32) -> Result<RgbaImage, PipelineError> {
    let exhausted = || PipelineError::ResourceExhausted { width, height };
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(CHANNELS))
        .ok_or_else(exhausted)?;

    let mut pixels = Vec::new();
    pixels.try_reserve_exact(len).map_err(|_| exhausted())?;
    pixels.resize(len, 0);
    RgbaImage::from_raw(width, height, pixels).ok_or_else(exhausted)
}

/// Grow `scratch` to exactly `len` zeroed values without aborting on OOM.
pub(crate) fn reserve_scratch(
    scratch: &mut Vec<f64>,
    len: usize,
    width: u32,
    height: u32,
) -> Result<(), PipelineError> {
    scratch.clear();
    scratch
        .try_reserve_exact(len)
        .map_err(|_| PipelineError::ResourceExhausted { width, height })?;
    scratch.resize(len, 0.0);
    Ok(())
}

/// Two same-sized rasters and a float scratch plane, reused across stages.
///
/// A stage reads `front`, writes `back`, and the pipeline calls
/// [`swap`](Self::swap) so the result becomes the next stage's input.
/// In-place stages operate on `front` directly.
pub(crate) struct Workspace {
    front: RgbaImage,
    back: RgbaImage,
    scratch: Vec<f64>,
}

impl Workspace {
    /// Take ownership of `image` as the front buffer and allocate a
    /// matching back buffer.
    pub(crate) fn new(image: RgbaImage) -> Result<Self, PipelineError> {
        let back = alloc_raster(image.width(), image.height())?;
        Ok(Self {
            front: image,
            back,
            scratch: Vec::new(),
        })
    }

    pub(crate) const fn front(&self) -> &RgbaImage {
        &self.front
    }

    pub(crate) const fn front_mut(&mut self) -> &mut RgbaImage {
        &mut self.front
    }

    /// Borrow the input, the output and the scratch plane at once.
    pub(crate) const fn split(&mut self) -> (&RgbaImage, &mut RgbaImage, &mut Vec<f64>) {
        (&self.front, &mut self.back, &mut self.scratch)
    }

    /// Make the last written back buffer the new front.
    pub(crate) const fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Reallocate the back buffer for a dimension-changing stage.
    pub(crate) fn resize_back(&mut self, width: u32, height: u32) -> Result<(), PipelineError> {
        if self.back.dimensions() != (width, height) {
            // Release the old buffer first so peak usage stays at two rasters.
            self.back = RgbaImage::new(0, 0);
            self.back = alloc_raster(width, height)?;
        }
        Ok(())
    }

    /// After a dimension change, bring the (now stale) back buffer in
    /// line with the front.
    pub(crate) fn match_back_to_front(&mut self) -> Result<(), PipelineError> {
        let (w, h) = self.front.dimensions();
        self.resize_back(w, h)
    }

    pub(crate) fn into_image(self) -> RgbaImage {
        self.front
    }
}

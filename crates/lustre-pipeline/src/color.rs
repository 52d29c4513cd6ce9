//! Per-channel color grading used by the enhancement chain.
//!
//! Each channel gets its own power curve and gain (warm reds, neutral
//! greens, slightly cooled blues), then the pixel's channels are pushed
//! apart around their minimum by a fixed factor.

use crate::raster::{CHANNELS, clamp_to_u8};
use crate::types::RgbaImage;

/// `(exponent, gain)` per RGB channel.
const CHANNEL_CURVES: [(f64, f64); 3] = [(0.9, 1.05), (0.95, 1.02), (1.1, 0.98)];

/// Spread applied around the per-pixel minimum.
pub const VIBRANCE: f64 = 1.15;

/// Grade one pixel.
#[must_use]
pub fn grade_pixel(rgb: [u8; 3]) -> [u8; 3] {
    let mut v = [0.0f64; 3];
    for (c, &(exponent, gain)) in CHANNEL_CURVES.iter().enumerate() {
        v[c] = (f64::from(rgb[c]) / 255.0).powf(exponent) * gain;
    }

    let max = v[0].max(v[1]).max(v[2]);
    let min = v[0].min(v[1]).min(v[2]);
    if max > min {
        for x in &mut v {
            *x = (*x - min).mul_add(VIBRANCE, min);
        }
    }
    v.map(|x| clamp_to_u8(x.clamp(0.0, 1.0) * 255.0))
}

/// Grade every pixel of `image` in place; alpha untouched.
pub fn enhance_color(image: &mut RgbaImage) {
    let buf: &mut [u8] = image;
    for px in buf.chunks_exact_mut(CHANNELS) {
        let out = grade_pixel([px[0], px[1], px[2]]);
        px[..3].copy_from_slice(&out);
    }
}

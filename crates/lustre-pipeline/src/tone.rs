//! Brightness and contrast tone mapping.
//!
//! Contrast is an S-curve around the midtone: a normalized `tanh` for
//! positive strength, a linear flattening toward 0.5 for negative
//! strength. Brightness is a gamma `1 + b/100` applied after the curve;
//! positive brightness lifts midtones, negative brightness lowers them.
//!
//! The per-sample mapping depends only on the 8-bit input value, so it is
//! evaluated once into a 256-entry lookup table.

use serde::{Deserialize, Serialize};

use crate::raster::{CHANNELS, clamp_to_u8};
use crate::types::RgbaImage;

/// Tone mapping parameters, each in `-50..=50`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParams {
    /// Brightness shift.
    pub brightness: f64,
    /// Contrast strength.
    pub contrast: f64,
}

impl ToneParams {
    /// Whether mapping with these parameters would change anything.
    #[must_use]
    pub fn is_active(self) -> bool {
        self.brightness != 0.0 || self.contrast != 0.0
    }
}

/// Contrast S-curve over `v` in `[0, 1]`.
///
/// `strength = 0` is the identity. The positive branch maps 0 to 0 and 1
/// to 1 exactly; the negative branch compresses toward 0.5.
#[must_use]
pub fn s_curve(v: f64, strength: f64) -> f64 {
    if strength == 0.0 {
        return v;
    }
    let factor = strength * 2.0;
    if factor > 0.0 {
        0.5 + (factor * (v - 0.5)).tanh() / (2.0 * (factor / 2.0).tanh())
    } else {
        0.5 + (v - 0.5) / (1.0 + factor.abs())
    }
}

/// Map one 8-bit sample through contrast then brightness.
#[must_use]
pub fn map_sample(value: u8, params: ToneParams) -> u8 {
    let v = f64::from(value) / 255.0;
    let curved = s_curve(v, params.contrast / 100.0).clamp(0.0, 1.0);
    let gamma = 1.0 + params.brightness / 100.0;
    clamp_to_u8(curved.powf(1.0 / gamma) * 255.0)
}

/// Apply tone mapping to the RGB channels of `image` in place.
pub fn tone_map(image: &mut RgbaImage, params: ToneParams) {
    let lut: [u8; 256] =
        std::array::from_fn(|v| map_sample(u8::try_from(v).unwrap_or(u8::MAX), params));
    let buf: &mut [u8] = image;
    for px in buf.chunks_exact_mut(CHANNELS) {
        for c in &mut px[..3] {
            *c = lut[usize::from(*c)];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(brightness: f64, contrast: f64) -> ToneParams {
        ToneParams {
            brightness,
            contrast,
        }
    }

    #[test]
    fn neutral_params_are_identity() {
        for v in 0..=255u8 {
            assert_eq!(map_sample(v, params(0.0, 0.0)), v);
        }
        assert!(!params(0.0, 0.0).is_active());
    }

    #[test]
    fn s_curve_fixes_midpoint_and_endpoints() {
        for strength in [-0.5, -0.2, 0.2, 0.5] {
            assert!((s_curve(0.5, strength) - 0.5).abs() < 1e-12);
        }
        for strength in [0.2, 0.5] {
            assert!(s_curve(0.0, strength).abs() < 1e-12);
            assert!((s_curve(1.0, strength) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn positive_contrast_spreads_and_negative_compresses() {
        assert!(s_curve(0.25, 0.5) < 0.25);
        assert!(s_curve(0.75, 0.5) > 0.75);
        assert!(s_curve(0.25, -0.5) > 0.25);
        assert!(s_curve(0.75, -0.5) < 0.75);
        // factor -1: 0.5 + (0.0 - 0.5) / 2
        assert!((s_curve(0.0, -0.5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn positive_brightness_lifts_midtones() {
        let out = map_sample(128, params(50.0, 0.0));
        assert!(out > 128, "got {out}");
        let out = map_sample(128, params(-50.0, 0.0));
        assert!(out < 128, "got {out}");
    }

    #[test]
    fn brightness_keeps_black_and_white() {
        for b in [-50.0, 50.0] {
            assert_eq!(map_sample(0, params(b, 0.0)), 0);
            assert_eq!(map_sample(255, params(b, 0.0)), 255);
        }
    }

    #[test]
    fn mapping_is_monotonic() {
        for (b, c) in [(30.0, 40.0), (-20.0, -50.0), (50.0, 50.0)] {
            let mut prev = 0;
            for v in 0..=255u8 {
                let out = map_sample(v, params(b, c));
                assert!(out >= prev, "b={b} c={c}: {v} -> {out} < {prev}");
                prev = out;
            }
        }
    }

    #[test]
    fn tone_map_keeps_alpha_and_uniformity() {
        let mut img = RgbaImage::from_pixel(5, 5, image::Rgba([128, 128, 128, 77]));
        tone_map(&mut img, params(50.0, 0.0));
        let first = *img.get_pixel(0, 0);
        assert!(first.0[0] > 128);
        assert_eq!(first.0[3], 77);
        assert!(img.pixels().all(|p| *p == first));
    }
}

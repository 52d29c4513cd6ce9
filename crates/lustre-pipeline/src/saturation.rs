//! Saturation scaling through an HSL round trip.
//!
//! Hue and lightness are kept; only the HSL saturation is multiplied by
//! `(saturation + 100) / 100` and clamped to `[0, 1]`. Achromatic pixels
//! (R = G = B) have no hue and are left exactly as they are.

use crate::raster::{CHANNELS, clamp_to_u8};
use crate::types::RgbaImage;

/// HSL color with every component in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    /// Hue as a fraction of a full turn.
    pub h: f64,
    /// Saturation.
    pub s: f64,
    /// Lightness.
    pub l: f64,
}

/// Convert normalized RGB to HSL.
#[must_use]
pub fn rgb_to_hsl(r: f64, g: f64, b: f64) -> Hsl {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    let d = max - min;
    if d == 0.0 {
        return Hsl { h: 0.0, s: 0.0, l };
    }

    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    #[allow(clippy::float_cmp)]
    let sector = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    Hsl {
        h: sector / 6.0,
        s,
        l,
    }
}

/// Convert HSL back to normalized RGB with the six-sector construction.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn hsl_to_rgb(hsl: Hsl) -> (f64, f64, f64) {
    let Hsl { h, s, l } = hsl;
    let c = (1.0 - 2.0f64.mul_add(l, -1.0).abs()) * s;
    let h6 = h * 6.0;
    let x = c * (1.0 - (h6.rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match (h6.floor().max(0.0) as u8).min(5) {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (r + m, g + m, b + m)
}

/// Saturation multiplier for a slider value in `-50..=50`.
#[must_use]
pub fn saturation_factor(saturation: f64) -> f64 {
    (saturation + 100.0) / 100.0
}

/// Scale HSL saturation of one 8-bit pixel.
#[must_use]
pub fn saturate_pixel(rgb: [u8; 3], factor: f64) -> [u8; 3] {
    if rgb[0] == rgb[1] && rgb[1] == rgb[2] {
        return rgb;
    }
    let [r, g, b] = rgb.map(|v| f64::from(v) / 255.0);
    let mut hsl = rgb_to_hsl(r, g, b);
    hsl.s = (hsl.s * factor).clamp(0.0, 1.0);
    let (r, g, b) = hsl_to_rgb(hsl);
    [r, g, b].map(|v| clamp_to_u8(v * 255.0))
}

/// Adjust saturation of `image` in place; alpha untouched.
pub fn adjust_saturation(image: &mut RgbaImage, saturation: f64) {
    let factor = saturation_factor(saturation);
    let buf: &mut [u8] = image;
    for px in buf.chunks_exact_mut(CHANNELS) {
        let out = saturate_pixel([px[0], px[1], px[2]], factor);
        px[..3].copy_from_slice(&out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(rgb: [u8; 3]) -> [u8; 3] {
        let [r, g, b] = rgb.map(|v| f64::from(v) / 255.0);
        let (r, g, b) = hsl_to_rgb(rgb_to_hsl(r, g, b));
        [r, g, b].map(|v| clamp_to_u8(v * 255.0))
    }

    #[test]
    fn hsl_round_trip_within_one_level() {
        for r in (0..=255u8).step_by(15) {
            for g in (0..=255u8).step_by(17) {
                for b in (0..=255u8).step_by(13) {
                    let back = round_trip([r, g, b]);
                    for c in 0..3 {
                        assert!(
                            back[c].abs_diff([r, g, b][c]) <= 1,
                            "({r},{g},{b}) came back as {back:?}",
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn primary_hues() {
        let red = rgb_to_hsl(1.0, 0.0, 0.0);
        assert!(red.h.abs() < 1e-12 && (red.s - 1.0).abs() < 1e-12);
        let green = rgb_to_hsl(0.0, 1.0, 0.0);
        assert!((green.h - 1.0 / 3.0).abs() < 1e-12);
        let blue = rgb_to_hsl(0.0, 0.0, 1.0);
        assert!((blue.h - 2.0 / 3.0).abs() < 1e-12);
        // Magenta sits where g < b in the red sector.
        let magenta = rgb_to_hsl(1.0, 0.0, 1.0);
        assert!((magenta.h - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn unit_factor_is_identity_within_rounding() {
        let mut img = RgbaImage::from_fn(16, 16, |x, y| {
            image::Rgba([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8, 255])
        });
        let original = img.clone();
        adjust_saturation(&mut img, 0.0);
        for (a, b) in original.pixels().zip(img.pixels()) {
            for c in 0..4 {
                assert!(a.0[c].abs_diff(b.0[c]) <= 1, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn gray_pixels_are_invariant() {
        for factor in [0.5, 1.0, 1.5, 10.0] {
            for v in [0u8, 1, 77, 128, 254, 255] {
                assert_eq!(saturate_pixel([v, v, v], factor), [v, v, v]);
            }
        }
    }

    #[test]
    fn factor_bounds() {
        assert!((saturation_factor(-50.0) - 0.5).abs() < f64::EPSILON);
        assert!((saturation_factor(0.0) - 1.0).abs() < f64::EPSILON);
        assert!((saturation_factor(50.0) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn boosting_widens_channel_spread() {
        let before = [150u8, 110, 100];
        let after = saturate_pixel(before, 1.5);
        let spread = |p: [u8; 3]| p.iter().max().unwrap_or(&0) - p.iter().min().unwrap_or(&0);
        assert!(spread(after) > spread(before), "{after:?}");
        let muted = saturate_pixel(before, 0.5);
        assert!(spread(muted) < spread(before), "{muted:?}");
    }

    #[test]
    fn alpha_untouched() {
        let mut img = RgbaImage::from_pixel(3, 3, image::Rgba([200, 50, 10, 42]));
        adjust_saturation(&mut img, 50.0);
        assert!(img.pixels().all(|p| p.0[3] == 42));
    }
}

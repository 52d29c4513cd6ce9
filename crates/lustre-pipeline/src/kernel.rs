//! Normalized 1-D Gaussian kernels for the separable blur.

/// An odd-length, symmetric set of non-negative weights summing to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    weights: Vec<f64>,
}

impl Kernel {
    /// Longest kernel [`Kernel::gaussian`] will build.
    pub const MAX_LEN: usize = 65_537;

    /// Build the Gaussian kernel for a blur `radius`.
    ///
    /// `size = max(3, next_odd(ceil(radius * 6)))` and `sigma = radius / 3`,
    /// so the kernel spans three standard deviations on each side. The
    /// size is capped at [`Kernel::MAX_LEN`].
    ///
    /// A non-positive or non-finite radius yields the identity kernel
    /// `[1.0]`.
    #[must_use]
    pub fn gaussian(radius: f64) -> Self {
        Self::truncated(radius, Self::MAX_LEN)
    }

    /// Like [`Kernel::gaussian`], but with at most `max_len` taps
    /// (rounded down to odd, never below 3). Sigma is unaffected.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn truncated(radius: f64, max_len: usize) -> Self {
        if !radius.is_finite() || radius <= 0.0 {
            return Self {
                weights: vec![1.0],
            };
        }

        let size = kernel_size(radius, odd_cap(max_len));
        let sigma = radius / 3.0;
        let two_sigma_sq = 2.0 * sigma * sigma;
        let center = size / 2;

        // Sigma too small to represent: every off-center tap is 0.
        if two_sigma_sq < f64::MIN_POSITIVE {
            let mut weights = vec![0.0; size];
            weights[center] = 1.0;
            return Self { weights };
        }

        let mut weights: Vec<f64> = (0..size)
            .map(|i| {
                let d = i as f64 - center as f64;
                (-(d * d) / two_sigma_sq).exp()
            })
            .collect();

        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        Self { weights }
    }

    /// The weights, center tap at index `len() / 2`.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of taps (always odd).
    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Always `false`; a kernel has at least one tap.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Offset of the center tap.
    #[must_use]
    pub fn center(&self) -> usize {
        self.weights.len() / 2
    }

    /// Whether all weight sits on the center tap.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        let center = self.center();
        self.weights
            .iter()
            .enumerate()
            .all(|(i, &w)| i == center || w <= 0.0)
    }
}

fn odd_cap(max_len: usize) -> usize {
    let cap = max_len.max(3);
    if cap % 2 == 0 { cap - 1 } else { cap }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn kernel_size(radius: f64, cap: usize) -> usize {
    let span = (radius * 6.0).ceil();
    if span >= cap as f64 {
        return cap;
    }
    let span = span as usize;
    let odd = if span % 2 == 0 { span + 1 } else { span };
    odd.clamp(3, cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADII: [f64; 11] = [
        1e-200, 0.01, 0.3, 0.5, 1.0, 1.2, 1.75, 2.0, 3.2, 7.9, 1e300,
    ];

    #[test]
    fn length_is_odd_and_at_least_three() {
        for radius in RADII {
            let k = Kernel::gaussian(radius);
            assert!(k.len() >= 3, "radius {radius}: len {}", k.len());
            assert_eq!(k.len() % 2, 1, "radius {radius}: len {}", k.len());
        }
    }

    #[test]
    fn weights_sum_to_one() {
        for radius in RADII {
            let sum: f64 = Kernel::gaussian(radius).weights().iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "radius {radius}: sum {sum}");
        }
    }

    #[test]
    fn weights_are_symmetric_and_non_negative() {
        for radius in RADII {
            let k = Kernel::gaussian(radius);
            let w = k.weights();
            for i in 0..w.len() {
                assert!(w[i] >= 0.0);
                assert!(
                    (w[i] - w[w.len() - 1 - i]).abs() < 1e-15,
                    "radius {radius}: asymmetry at {i}",
                );
            }
        }
    }

    #[test]
    fn size_follows_six_radius_rule() {
        // ceil(1.0 * 6) = 6 -> 7; ceil(2.0 * 6) = 12 -> 13; ceil(1.2 * 6) = 8 -> 9.
        assert_eq!(Kernel::gaussian(1.0).len(), 7);
        assert_eq!(Kernel::gaussian(2.0).len(), 13);
        assert_eq!(Kernel::gaussian(1.2).len(), 9);
        // ceil(0.25 * 6) = 2 -> 3.
        assert_eq!(Kernel::gaussian(0.25).len(), 3);
    }

    #[test]
    fn center_weight_is_largest() {
        let k = Kernel::gaussian(2.0);
        let c = k.weights()[k.center()];
        assert!(k.weights().iter().all(|&w| w <= c));
    }

    #[test]
    fn degenerate_radius_is_identity() {
        assert!(Kernel::gaussian(0.0).is_identity());
        assert!(Kernel::gaussian(-1.0).is_identity());
        assert!(Kernel::gaussian(f64::NAN).is_identity());
        assert_eq!(Kernel::gaussian(0.0).weights(), &[1.0]);
    }

    #[test]
    fn vanishing_radius_puts_all_weight_on_center() {
        let k = Kernel::gaussian(1e-200);
        assert_eq!(k.weights(), &[0.0, 1.0, 0.0]);
        assert!(k.is_identity());
    }

    #[test]
    fn huge_radius_is_capped() {
        assert_eq!(Kernel::gaussian(f64::MAX).len(), Kernel::MAX_LEN);
        assert_eq!(Kernel::gaussian(1e300).len(), Kernel::MAX_LEN);
        assert!(!Kernel::gaussian(f64::MAX).is_identity());
    }

    #[test]
    fn truncated_keeps_odd_length_and_sigma() {
        assert_eq!(Kernel::truncated(2.0, 8).len(), 7);
        assert_eq!(Kernel::truncated(2.0, 1).len(), 3);
        assert_eq!(Kernel::truncated(2.0, 100), Kernel::gaussian(2.0));
        // Same sigma: tap ratios match the full kernel.
        let full = Kernel::gaussian(2.0);
        let short = Kernel::truncated(2.0, 5);
        let ratio = |k: &Kernel| k.weights()[k.center() + 1] / k.weights()[k.center()];
        assert!((ratio(&full) - ratio(&short)).abs() < 1e-12);
    }
}

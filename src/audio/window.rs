//! Window functions applied ahead of the spectral transform

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

/// Tapering window for spectrum snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    Rectangular,
    Hann,
    Blackman,
    /// 4-term Blackman-Harris, -92 dB sidelobes
    #[default]
    BlackmanHarris,
}

impl WindowFunction {
    /// Symmetric window coefficients of length `len`
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len <= 1 {
            return vec![1.0; len];
        }

        match self {
            WindowFunction::Rectangular => vec![1.0; len],
            WindowFunction::Hann => cosine_sum(len, &[0.5, 0.5]),
            WindowFunction::Blackman => cosine_sum(len, &[0.42, 0.5, 0.08]),
            WindowFunction::BlackmanHarris => {
                cosine_sum(len, &[0.35875, 0.48829, 0.14128, 0.01168])
            }
        }
    }
}

// w[n] = a0 - a1 cos(x) + a2 cos(2x) - a3 cos(3x), x = 2*pi*n/(N-1)
fn cosine_sum(len: usize, coeffs: &[f32]) -> Vec<f32> {
    let scale = TAU / (len - 1) as f32;

    (0..len)
        .map(|n| {
            let phase = n as f32 * scale;
            coeffs
                .iter()
                .enumerate()
                .map(|(k, &a)| {
                    let term = a * (k as f32 * phase).cos();
                    if k % 2 == 0 {
                        term
                    } else {
                        -term
                    }
                })
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn blackman_harris_is_symmetric_and_tapered() {
        let w = WindowFunction::BlackmanHarris.coefficients(65);

        assert_approx(w[0], 0.00006, 1e-4);
        assert_approx(w[64], 0.00006, 1e-4);
        assert_approx(w[32], 1.0, 1e-4);
        for i in 0..32 {
            assert_approx(w[i], w[64 - i], 1e-5);
        }
    }

    #[test]
    fn hann_matches_closed_form() {
        let len = 16;
        let w = WindowFunction::Hann.coefficients(len);

        for (i, &value) in w.iter().enumerate() {
            let expected = 0.5 * (1.0 - (TAU * i as f32 / (len - 1) as f32).cos());
            assert_approx(value, expected, 1e-6);
        }
    }

    #[test]
    fn rectangular_is_flat() {
        assert_eq!(WindowFunction::Rectangular.coefficients(4), vec![1.0; 4]);
    }

    #[test]
    fn degenerate_lengths_do_not_divide_by_zero() {
        assert_eq!(WindowFunction::BlackmanHarris.coefficients(1), vec![1.0]);
        assert!(WindowFunction::Blackman.coefficients(0).is_empty());
    }

    #[test]
    fn window_names_serialize_in_snake_case() {
        let json = serde_json::to_string(&WindowFunction::BlackmanHarris).unwrap();
        assert_eq!(json, "\"blackman_harris\"");
    }
}

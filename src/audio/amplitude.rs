//! Loudness estimation from time-domain samples

use super::AmplitudeConfig;

/// Decibel loudness estimator.
///
/// The value is `10 * log10(mean(square(s * gain))) + offset_db`, floored at 0.
/// It is a calibrated loudness proxy rather than true dBFS: the gain makes up
/// for quiet microphone input and the offset lifts the scale into a positive
/// range.
#[derive(Debug, Clone, Copy)]
pub struct AmplitudeEstimator {
    gain: f32,
    offset_db: f32,
}

impl AmplitudeEstimator {
    pub fn new(gain: f32, offset_db: f32) -> Self {
        Self { gain, offset_db }
    }

    pub fn from_config(config: &AmplitudeConfig) -> Self {
        Self::new(config.gain, config.offset_db)
    }

    /// Estimate loudness of a sample snapshot.
    ///
    /// Silence (zero energy) yields 0 instead of negative infinity.
    pub fn estimate(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum: f32 = samples
            .iter()
            .map(|&s| {
                let scaled = s * self.gain;
                scaled * scaled
            })
            .sum();

        if !sum.is_finite() || sum <= 0.0 {
            return 0.0;
        }

        let db = 10.0 * (sum / samples.len() as f32).log10() + self.offset_db;
        db.max(0.0)
    }
}

impl Default for AmplitudeEstimator {
    fn default() -> Self {
        Self::from_config(&AmplitudeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn silence_is_zero_not_nan() {
        let estimator = AmplitudeEstimator::default();
        let db = estimator.estimate(&vec![0.0; 8192]);

        assert_eq!(db, 0.0);
    }

    #[test]
    fn empty_buffer_is_zero() {
        assert_eq!(AmplitudeEstimator::default().estimate(&[]), 0.0);
    }

    #[test]
    fn very_quiet_input_is_floored_at_zero() {
        let estimator = AmplitudeEstimator::default();
        // 1e-7 * 1500 = 1.5e-4 -> 10*log10(2.25e-8) + 20 ~= -56 dB before clamping
        let db = estimator.estimate(&vec![1e-7; 1024]);

        assert_eq!(db, 0.0);
    }

    #[test]
    fn constant_signal_matches_closed_form() {
        let estimator = AmplitudeEstimator::new(1500.0, 20.0);
        // (0.01 * 1500)^2 = 225 -> 10*log10(225) + 20
        let db = estimator.estimate(&vec![0.01; 4096]);

        assert_approx(db, 10.0 * 225.0f32.log10() + 20.0, 1e-3);
    }

    #[test]
    fn full_scale_sine_reads_about_eighty_db() {
        let estimator = AmplitudeEstimator::default();
        let samples: Vec<f32> = (0..8192)
            .map(|i| (TAU * 1000.0 * i as f32 / 16000.0).sin())
            .collect();

        // mean square of a unit sine is 0.5 -> 10*log10(0.5 * 1500^2) + 20
        assert_approx(estimator.estimate(&samples), 80.51, 0.05);
    }

    #[test]
    fn louder_input_reads_higher() {
        let estimator = AmplitudeEstimator::default();
        let quiet = estimator.estimate(&vec![0.001; 512]);
        let loud = estimator.estimate(&vec![0.01; 512]);

        assert_approx(loud - quiet, 20.0, 1e-3);
    }

    #[test]
    fn no_upper_clamp() {
        let estimator = AmplitudeEstimator::new(1e6, 20.0);
        assert!(estimator.estimate(&vec![1.0; 16]) > 120.0);
    }

    #[test]
    fn nan_input_is_treated_as_silence() {
        let estimator = AmplitudeEstimator::default();
        assert_eq!(estimator.estimate(&[f32::NAN, 0.5]), 0.0);
    }
}

//! Dominant-frequency estimation with band-limited peak search

use super::FrequencyConfig;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// User-adjustable search band in Hz.
///
/// Stored as configured; clamping and ordering happen when the band is
/// converted to bins, since the valid range depends on the sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: i32,
    pub high_hz: i32,
}

impl FrequencyBand {
    pub fn new(low_hz: i32, high_hz: i32) -> Self {
        Self { low_hz, high_hz }
    }

    /// Band clamped into `[0, Nyquist]` with `low <= high`.
    ///
    /// Nyquist is rounded up for odd sample rates so the top bin stays reachable.
    pub fn normalized(&self, sample_rate: u32) -> (i32, i32) {
        let nyquist = ((sample_rate as i64 + 1) / 2).min(i32::MAX as i64) as i32;
        let low = self.low_hz.clamp(0, nyquist);
        let high = self.high_hz.clamp(0, nyquist);
        if low <= high {
            (low, high)
        } else {
            (high, low)
        }
    }

    /// Bin range `[low_bin, high_bin)` for a spectrum of `window_len` bins.
    ///
    /// `bin = hz * window_len * 2 / sample_rate`, every index clamped into `[0, window_len)`.
    pub fn bins(&self, sample_rate: u32, window_len: usize) -> Range<usize> {
        if sample_rate == 0 {
            return 0..0;
        }

        let (low, high) = self.normalized(sample_rate);
        let to_bin = |hz: i32| -> usize {
            let bin = hz as i64 * window_len as i64 * 2 / sample_rate as i64;
            bin.clamp(0, window_len as i64) as usize
        };

        to_bin(low)..to_bin(high)
    }
}

impl Default for FrequencyBand {
    fn default() -> Self {
        Self::new(0, 20000)
    }
}

/// Outcome of one peak search
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeakEstimate {
    /// A bin in the band exceeded the threshold
    Detected {
        /// Fractional bin after neighbour interpolation
        bin: f32,
        frequency: f32,
        /// Scaled magnitude of the peak bin
        magnitude: f32,
    },
    /// Nothing in the band exceeded the threshold; reads as 0 Hz
    NoPeak,
}

impl PeakEstimate {
    pub fn frequency(&self) -> f32 {
        match self {
            PeakEstimate::Detected { frequency, .. } => *frequency,
            PeakEstimate::NoPeak => 0.0,
        }
    }

    pub fn is_detected(&self) -> bool {
        matches!(self, PeakEstimate::Detected { .. })
    }
}

/// Finds the strongest spectrum bin inside a band and refines it between bins
#[derive(Debug, Clone, Copy)]
pub struct FrequencyEstimator {
    gain: f32,
    threshold: f32,
    sample_rate: u32,
    window_len: usize,
}

impl FrequencyEstimator {
    pub fn new(gain: f32, threshold: f32, sample_rate: u32, window_len: usize) -> Self {
        Self {
            gain,
            threshold,
            sample_rate,
            window_len,
        }
    }

    pub fn from_config(config: &FrequencyConfig, sample_rate: u32, window_len: usize) -> Self {
        Self::new(config.gain, config.threshold, sample_rate, window_len)
    }

    /// Frequency of a (possibly fractional) bin
    pub fn bin_to_hz(&self, bin: f32) -> f32 {
        bin * (self.sample_rate as f32 / 2.0) / self.window_len as f32
    }

    /// Search `bins` of `spectrum` for the dominant frequency
    pub fn estimate(&self, spectrum: &[f32], bins: Range<usize>) -> PeakEstimate {
        debug_assert_eq!(spectrum.len(), self.window_len);

        let len = spectrum.len().min(self.window_len);
        let bins = bins.start.min(len)..bins.end.min(len);

        let mut max_magnitude = 0.0f32;
        let mut peak: Option<usize> = None;
        for j in bins {
            let scaled = spectrum[j] * self.gain;
            if scaled > max_magnitude && scaled > self.threshold {
                max_magnitude = scaled;
                peak = Some(j);
            }
        }

        let Some(peak) = peak else {
            return PeakEstimate::NoPeak;
        };

        let mut bin = peak as f32;
        if peak > 0 && peak + 1 < len && spectrum[peak] > 0.0 {
            // Gain cancels in the neighbour ratios
            let d_left = spectrum[peak - 1] / spectrum[peak];
            let d_right = spectrum[peak + 1] / spectrum[peak];
            bin += 0.5 * (d_right * d_right - d_left * d_left);
        }

        PeakEstimate::Detected {
            bin,
            frequency: self.bin_to_hz(bin),
            magnitude: max_magnitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SpectrumAnalyzer, WindowFunction};
    use std::f32::consts::TAU;

    const SAMPLE_RATE: u32 = 16000;
    const W: usize = 8192;

    fn assert_approx(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    fn estimator() -> FrequencyEstimator {
        FrequencyEstimator::new(500.0, 0.2, SAMPLE_RATE, W)
    }

    fn sine_spectrum(freq: f32) -> Vec<f32> {
        let mut analyzer = SpectrumAnalyzer::new(W);
        let samples: Vec<f32> = (0..analyzer.fft_size())
            .map(|i| (TAU * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        let mut spectrum = vec![0.0; W];
        analyzer.magnitudes(&samples, WindowFunction::BlackmanHarris, &mut spectrum);
        spectrum
    }

    #[test]
    fn band_outside_range_is_clamped_to_spectrum() {
        let bins = FrequencyBand::new(-100, 999_999).bins(SAMPLE_RATE, W);
        assert_eq!(bins, 0..W);
    }

    #[test]
    fn inverted_band_is_reordered() {
        let band = FrequencyBand::new(4000, 1000);
        assert_eq!(band.normalized(SAMPLE_RATE), (1000, 4000));
        assert_eq!(band.bins(SAMPLE_RATE, W), 1024..4096);
    }

    #[test]
    fn default_band_has_non_zero_upper_bin() {
        let bins = FrequencyBand::default().bins(44100, W);

        assert_eq!(bins.start, 0);
        assert_eq!(bins.end, 20000 * W * 2 / 44100);
        assert!(bins.end > 0);
    }

    #[test]
    fn odd_sample_rate_still_reaches_top_bin() {
        let band = FrequencyBand::new(0, 99_999);

        assert_eq!(band.normalized(11025), (0, 5513));
        assert_eq!(band.bins(11025, W), 0..W);
    }

    #[test]
    fn zero_sample_rate_yields_empty_range() {
        assert!(FrequencyBand::default().bins(0, W).is_empty());
    }

    #[test]
    fn silent_spectrum_reports_no_peak() {
        let estimate = estimator().estimate(&vec![0.0; W], 0..W);

        assert_eq!(estimate, PeakEstimate::NoPeak);
        assert_eq!(estimate.frequency(), 0.0);
        assert!(!estimate.is_detected());
    }

    #[test]
    fn bins_below_threshold_are_ignored() {
        let mut spectrum = vec![0.0; W];
        // 0.0003 * 500 = 0.15 < 0.2
        spectrum[100] = 0.0003;

        assert_eq!(estimator().estimate(&spectrum, 0..W), PeakEstimate::NoPeak);
    }

    #[test]
    fn peaks_outside_band_are_ignored() {
        let mut spectrum = vec![0.0; W];
        spectrum[50] = 0.5;
        spectrum[300] = 0.1;

        let estimate = estimator().estimate(&spectrum, 200..400);

        match estimate {
            PeakEstimate::Detected { bin, magnitude, .. } => {
                assert_eq!(bin, 300.0);
                assert_approx(magnitude, 50.0, 1e-3);
            }
            PeakEstimate::NoPeak => panic!("expected a peak"),
        }
    }

    #[test]
    fn ties_keep_the_lowest_bin() {
        let mut spectrum = vec![0.0; W];
        spectrum[10] = 0.1;
        spectrum[20] = 0.1;

        let estimate = estimator().estimate(&spectrum, 0..W);
        assert_approx(estimate.frequency(), estimator().bin_to_hz(10.0), 1e-4);
    }

    #[test]
    fn neighbour_ratios_shift_the_bin() {
        let mut spectrum = vec![0.0; W];
        spectrum[99] = 0.25;
        spectrum[100] = 1.0;
        spectrum[101] = 0.5;

        let estimate = estimator().estimate(&spectrum, 0..W);

        // 100 + 0.5 * (0.5^2 - 0.25^2)
        match estimate {
            PeakEstimate::Detected { bin, .. } => assert_approx(bin, 100.09375, 1e-5),
            PeakEstimate::NoPeak => panic!("expected a peak"),
        }
    }

    #[test]
    fn edge_bins_skip_interpolation() {
        let mut spectrum = vec![0.0; W];
        spectrum[W - 1] = 1.0;
        spectrum[W - 2] = 0.5;

        match estimator().estimate(&spectrum, 0..W) {
            PeakEstimate::Detected { bin, .. } => assert_eq!(bin, (W - 1) as f32),
            PeakEstimate::NoPeak => panic!("expected a peak"),
        }
    }

    #[test]
    fn bin_centred_sine_is_found_within_two_hz() {
        let estimate = estimator().estimate(&sine_spectrum(1000.0), 0..W);
        assert_approx(estimate.frequency(), 1000.0, 2.0);
    }

    #[test]
    fn sine_within_band_converges_within_one_bin() {
        let resolution = SAMPLE_RATE as f32 / 2.0 / W as f32;
        let bins = FrequencyBand::new(200, 3000).bins(SAMPLE_RATE, W);

        for freq in [261.63, 440.0, 1234.5, 2800.0] {
            let estimate = estimator().estimate(&sine_spectrum(freq), bins.clone());
            assert_approx(estimate.frequency(), freq, resolution);
        }
    }

    #[test]
    fn interpolation_moves_closer_than_bin_centre() {
        let resolution = SAMPLE_RATE as f32 / 2.0 / W as f32;
        let freq = (1024.0 + 0.3) * resolution;

        let estimate = estimator().estimate(&sine_spectrum(freq), 0..W);
        let centre = 1024.0 * resolution;

        let refined_error = (estimate.frequency() - freq).abs();
        let centre_error = (centre - freq).abs();
        assert!(
            refined_error < centre_error,
            "refined error {refined_error} should beat bin-centre error {centre_error}"
        );
    }
}

//! Windowed FFT producing magnitude spectrum snapshots

use super::WindowFunction;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Magnitude spectrum analyzer.
///
/// Produces `bins` magnitudes covering `0..sample_rate/2` from the latest
/// `2 * bins` samples, so bin `i` sits at `i * (sample_rate / 2) / bins` Hz.
/// Magnitudes are `|X[i]| / fft_size`.
pub struct SpectrumAnalyzer {
    bins: usize,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window_kind: WindowFunction,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer producing `bins` magnitudes per snapshot
    pub fn new(bins: usize) -> Self {
        let bins = bins.max(1);
        let fft_size = bins * 2;
        let fft = FftPlanner::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window_kind = WindowFunction::default();

        Self {
            bins,
            fft_size,
            fft,
            window_kind,
            window: window_kind.coefficients(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    /// Number of output magnitudes (W)
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Number of time-domain samples consumed per snapshot
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Transform `samples` (oldest first, `fft_size()` long) into `out` (`bins()` long)
    pub fn magnitudes(&mut self, samples: &[f32], window: WindowFunction, out: &mut [f32]) {
        debug_assert_eq!(samples.len(), self.fft_size);
        debug_assert_eq!(out.len(), self.bins);

        if window != self.window_kind {
            self.window_kind = window;
            self.window = window.coefficients(self.fft_size);
        }

        // Short input is zero-padded at the front so the newest sample stays last
        let pad = self.fft_size.saturating_sub(samples.len());
        let recent = &samples[samples.len().saturating_sub(self.fft_size)..];
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { recent[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        for (slot, value) in out.iter_mut().zip(self.buffer.iter()) {
            *slot = value.norm() * norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (TAU * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    fn peak_bin(magnitudes: &[f32]) -> usize {
        magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn sizes_follow_bin_count() {
        let analyzer = SpectrumAnalyzer::new(512);
        assert_eq!(analyzer.bins(), 512);
        assert_eq!(analyzer.fft_size(), 1024);
    }

    #[test]
    fn silence_has_no_energy() {
        let mut analyzer = SpectrumAnalyzer::new(256);
        let mut out = vec![1.0; 256];

        analyzer.magnitudes(&vec![0.0; 512], WindowFunction::BlackmanHarris, &mut out);

        assert!(out.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn bin_centred_sine_peaks_at_its_bin() {
        // 16 kHz, 1024 bins: bin width is 7.8125 Hz, so 1000 Hz lands on bin 128
        let mut analyzer = SpectrumAnalyzer::new(1024);
        let samples = sine(1000.0, 16000.0, 2048, 1.0);
        let mut out = vec![0.0; 1024];

        analyzer.magnitudes(&samples, WindowFunction::BlackmanHarris, &mut out);

        assert_eq!(peak_bin(&out), 128);
        assert!((out[127] - out[129]).abs() < 1e-3);
        // coherent gain of Blackman-Harris is ~0.359, halved for a real sine
        assert!((out[128] - 0.179).abs() < 0.01, "peak was {}", out[128]);
    }

    #[test]
    fn window_can_change_between_snapshots() {
        let mut analyzer = SpectrumAnalyzer::new(64);
        let samples = sine(1000.0, 8000.0, 128, 1.0);
        let mut rect = vec![0.0; 64];
        let mut harris = vec![0.0; 64];

        analyzer.magnitudes(&samples, WindowFunction::Rectangular, &mut rect);
        analyzer.magnitudes(&samples, WindowFunction::BlackmanHarris, &mut harris);

        assert_eq!(peak_bin(&rect), 16);
        assert_eq!(peak_bin(&harris), 16);
        assert!(rect[16] > harris[16]);
    }
}

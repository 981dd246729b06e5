//! Driver interface consumed by the measurement session

use super::{AudioBuffer, SpectrumAnalyzer, WindowFunction};
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Source of sample and spectrum snapshots.
///
/// Calls never wait on the device: they always fill the whole output slice
/// from whatever has been captured so far.
pub trait AudioDriver: Send + Sync {
    /// Device sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Snapshot length (W) this driver was built for
    fn window_len(&self) -> usize;

    /// Fill `out` with the latest `window_len()` samples, oldest first
    fn latest_samples(&self, out: &mut [f32]);

    /// Fill `out` with `window_len()` magnitudes of the latest input
    fn latest_spectrum(&self, window: WindowFunction, out: &mut [f32]);
}

/// Mono sample store fed by a producer (device callback, test signal).
///
/// Holds enough history for one spectrum snapshot (2W samples) plus headroom.
pub struct InputBuffer {
    sample_rate: u32,
    window_len: usize,
    samples: Mutex<AudioBuffer>,
    analyzer: Mutex<SpectrumAnalyzer>,
    received: Mutex<bool>,
    received_cv: Condvar,
}

impl InputBuffer {
    pub fn new(sample_rate: u32, window_len: usize) -> Self {
        let analyzer = SpectrumAnalyzer::new(window_len);
        let capacity = analyzer.fft_size() * 2;

        Self {
            sample_rate,
            window_len,
            samples: Mutex::new(AudioBuffer::new(capacity)),
            analyzer: Mutex::new(analyzer),
            received: Mutex::new(false),
            received_cv: Condvar::new(),
        }
    }

    /// Append mono samples
    pub fn push_samples(&self, data: &[f32]) {
        if data.is_empty() {
            return;
        }

        self.samples.lock().push_samples(data);

        let mut received = self.received.lock();
        if !*received {
            *received = true;
            self.received_cv.notify_all();
        }
    }

    /// Down-mix interleaved frames to mono and append them
    pub fn push_interleaved(&self, data: &[f32], channels: usize) {
        if channels <= 1 {
            self.push_samples(data);
            return;
        }

        let mono: Vec<f32> = data
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        self.push_samples(&mono);
    }

    /// Block until the first samples arrive or `timeout` elapses.
    ///
    /// Returns whether samples were received.
    pub fn wait_for_samples(&self, timeout: Duration) -> bool {
        let mut received = self.received.lock();
        if !*received {
            self.received_cv
                .wait_while_for(&mut received, |received| !*received, timeout);
        }
        *received
    }

    /// Samples pushed since creation
    pub fn samples_received(&self) -> u64 {
        self.samples.lock().total_written()
    }
}

impl AudioDriver for InputBuffer {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn window_len(&self) -> usize {
        self.window_len
    }

    fn latest_samples(&self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.window_len);
        self.samples.lock().copy_latest(out);
    }

    fn latest_spectrum(&self, window: WindowFunction, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.window_len);

        let mut analyzer = self.analyzer.lock();
        let mut snapshot = vec![0.0; analyzer.fft_size()];
        // Sample lock is held for the copy only, never across the FFT
        self.samples.lock().copy_latest(&mut snapshot);
        analyzer.magnitudes(&snapshot, window, out);
    }
}

//! Audio capture and analysis module

mod amplitude;
mod buffer;
mod capture;
mod driver;
mod fft;
mod frequency;
mod smoothing;
mod sources;
mod window;

pub use amplitude::AmplitudeEstimator;
pub use buffer::AudioBuffer;
pub use capture::{CaptureError, MicrophoneDriver};
pub use driver::{AudioDriver, InputBuffer};
pub use fft::SpectrumAnalyzer;
pub use frequency::{FrequencyBand, FrequencyEstimator, PeakEstimate};
pub use smoothing::Smoother;
pub use sources::{list_sources, AudioSource, SourceError, SourceType};
pub use window::WindowFunction;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Meter configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MeterConfig {
    /// Samples per amplitude snapshot and bins per spectrum snapshot (W)
    pub window_size: usize,

    /// Window applied before the spectral transform
    pub window: WindowFunction,

    /// Loudness stream settings
    pub amplitude: AmplitudeConfig,

    /// Dominant-frequency stream settings
    pub frequency: FrequencyConfig,

    /// How long to wait for the first device samples before giving up
    pub device_timeout_ms: u64,

    /// Source ID from `list_sources()`; `None` selects the default input device
    pub source_id: Option<String>,
}

/// Loudness stream settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmplitudeConfig {
    /// Tick interval in milliseconds
    pub interval_ms: u64,

    /// Moving-average depth (K)
    pub smoothing_depth: usize,

    /// Linear pre-scale compensating for low input gain
    pub gain: f32,

    /// Calibration offset added to the decibel value
    pub offset_db: f32,
}

impl Default for AmplitudeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 80,
            smoothing_depth: 5,
            gain: 1500.0,
            offset_db: 20.0,
        }
    }
}

/// Dominant-frequency stream settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrequencyConfig {
    /// Tick interval in milliseconds
    pub interval_ms: u64,

    /// Moving-average depth (K)
    pub smoothing_depth: usize,

    /// Linear pre-scale applied to spectrum magnitudes
    pub gain: f32,

    /// Minimum scaled magnitude for a bin to count as a peak
    pub threshold: f32,

    /// Restrict the peak search to `band`; otherwise search every bin
    pub band_limited: bool,

    /// Initial search band
    pub band: FrequencyBand,

    /// Skip smoothing and publishing on ticks where no peak was found
    pub hold_on_no_peak: bool,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            smoothing_depth: 5,
            gain: 500.0,
            threshold: 0.2,
            band_limited: true,
            band: FrequencyBand::default(),
            hold_on_no_peak: false,
        }
    }
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            window_size: 8192,
            window: WindowFunction::BlackmanHarris,
            amplitude: AmplitudeConfig::default(),
            frequency: FrequencyConfig::default(),
            device_timeout_ms: 2000,
            source_id: None,
        }
    }
}

impl MeterConfig {
    /// Whole-spectrum variant: no band limit and a deeper frequency average
    pub fn full_spectrum() -> Self {
        Self {
            frequency: FrequencyConfig {
                band_limited: false,
                smoothing_depth: 20,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load a (possibly partial) JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 2 {
            return Err(ConfigError::Invalid(format!(
                "window_size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.amplitude.interval_ms == 0 || self.frequency.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "measurement intervals must be non-zero".to_string(),
            ));
        }
        if self.amplitude.smoothing_depth == 0 || self.frequency.smoothing_depth == 0 {
            return Err(ConfigError::Invalid(
                "smoothing depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn amplitude_interval(&self) -> Duration {
        Duration::from_millis(self.amplitude.interval_ms)
    }

    pub fn frequency_interval(&self) -> Duration {
        Duration::from_millis(self.frequency.interval_ms)
    }

    pub fn device_timeout(&self) -> Duration {
        Duration::from_millis(self.device_timeout_ms)
    }
}

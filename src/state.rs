//! Meter state shared with the presentation layer

use crate::audio::{FrequencyBand, PeakEstimate};
use serde::Serialize;

/// One smoothed loudness update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AmplitudeReading {
    /// Moving average over the stream's history
    pub smoothed_db: f32,

    /// This tick's unsmoothed value
    pub raw_db: f32,
}

/// One smoothed dominant-frequency update
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyReading {
    /// Moving average over the stream's history
    pub smoothed_hz: f32,

    /// This tick's peak search outcome
    pub raw: PeakEstimate,
}

/// Latest meter values
#[derive(Debug, Clone, Serialize, Default)]
pub struct MeterState {
    /// Whether a measurement session is active
    pub running: bool,

    /// Device sample rate of the active session
    pub sample_rate: Option<u32>,

    /// Band the next frequency tick will search
    pub band: FrequencyBand,

    /// Latest loudness update
    pub amplitude: Option<AmplitudeReading>,

    /// Latest frequency update
    pub frequency: Option<FrequencyReading>,

    /// Loudness updates this session
    pub amplitude_updates: u64,

    /// Frequency updates this session
    pub frequency_updates: u64,
}

impl MeterState {
    /// Forget everything from the previous session
    pub fn clear_readings(&mut self) {
        self.amplitude = None;
        self.frequency = None;
        self.amplitude_updates = 0;
        self.frequency_updates = 0;
    }

    /// Rounded loudness for display, e.g. `"62dB"`, or `" - dB"` when idle
    pub fn amplitude_label(&self) -> String {
        match self.amplitude {
            Some(reading) if self.running => format!("{}dB", reading.smoothed_db.round() as i64),
            _ => " - dB".to_string(),
        }
    }

    /// Rounded frequency for display, e.g. `"440Hz"`, or `" - Hz"` when idle
    pub fn frequency_label(&self) -> String {
        match self.frequency {
            Some(reading) if self.running => format!("{}Hz", reading.smoothed_hz.round() as i64),
            _ => " - Hz".to_string(),
        }
    }
}

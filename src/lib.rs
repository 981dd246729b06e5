//! Mic Meter
//!
//! Samples the default (or configured) microphone and publishes a smoothed
//! loudness estimate every 80 ms and a smoothed dominant frequency every
//! 100 ms.

pub mod audio;
pub mod session;
pub mod state;

use audio::{list_sources, MeterConfig};
use session::{MeasurementListener, MeasurementSession, SessionError};
use state::{AmplitudeReading, FrequencyReading};
use std::sync::Arc;

/// Listener that writes every update to the log
struct LogListener;

impl MeasurementListener for LogListener {
    fn on_amplitude_updated(&self, reading: &AmplitudeReading) {
        log::info!("{}dB", reading.smoothed_db.round() as i64);
    }

    fn on_frequency_updated(&self, reading: &FrequencyReading) {
        log::info!("{}Hz", reading.smoothed_hz.round() as i64);
    }
}

fn load_config() -> Result<MeterConfig, SessionError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from {}", path);
            Ok(MeterConfig::from_json_file(path)?)
        }
        None => Ok(MeterConfig::default()),
    }
}

/// Run the meter on the configured microphone until Ctrl-C
pub async fn run() -> Result<(), SessionError> {
    env_logger::init();

    let config = load_config()?;

    match list_sources() {
        Ok(sources) => {
            for source in sources {
                log::info!("Input source {}: {}", source.id, source.name);
            }
        }
        Err(e) => log::warn!("Could not list input sources: {}", e),
    }

    let mut session = MeasurementSession::new(config, Arc::new(LogListener));
    session.start_microphone().await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
    }

    let state = session.snapshot();
    log::info!(
        "Stopping at {} / {} after {} loudness and {} frequency updates",
        state.amplitude_label(),
        state.frequency_label(),
        state.amplitude_updates,
        state.frequency_updates
    );
    session.stop();

    Ok(())
}

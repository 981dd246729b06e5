//! Measurement session: periodic loudness and frequency meters

use crate::audio::{
    AmplitudeEstimator, AudioDriver, CaptureError, ConfigError, FrequencyBand,
    FrequencyEstimator, MeterConfig, MicrophoneDriver, Smoother,
};
use crate::state::{AmplitudeReading, FrequencyReading, MeterState};
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Session errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No input device available: {0}")]
    NoDevice(String),

    #[error("Audio capture failed: {0}")]
    Capture(CaptureError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Driver window size {actual} does not match configured {expected}")]
    WindowMismatch { expected: usize, actual: usize },

    #[error("Audio thread error: {0}")]
    Join(String),
}

impl From<CaptureError> for SessionError {
    fn from(e: CaptureError) -> Self {
        if e.is_no_device() {
            SessionError::NoDevice(e.to_string())
        } else {
            SessionError::Capture(e)
        }
    }
}

/// Measurement update, for listeners that prefer a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementEvent {
    Amplitude(AmplitudeReading),
    Frequency(FrequencyReading),
}

/// Receives every smoothed update.
///
/// Called from the meter tasks; implementations must not block.
pub trait MeasurementListener: Send + Sync {
    fn on_amplitude_updated(&self, reading: &AmplitudeReading);

    fn on_frequency_updated(&self, reading: &FrequencyReading);
}

impl MeasurementListener for mpsc::UnboundedSender<MeasurementEvent> {
    fn on_amplitude_updated(&self, reading: &AmplitudeReading) {
        let _ = self.send(MeasurementEvent::Amplitude(*reading));
    }

    fn on_frequency_updated(&self, reading: &FrequencyReading) {
        let _ = self.send(MeasurementEvent::Frequency(*reading));
    }
}

/// Handles of an active session
struct RunningSession {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    driver: Arc<dyn AudioDriver>,
}

/// Drives the amplitude and frequency meters on independent intervals.
///
/// Idle until [`start`](Self::start); [`stop`](Self::stop) cancels both meters
/// and discards their buffers and smoothing history. Must be started from
/// within a tokio runtime.
pub struct MeasurementSession {
    config: MeterConfig,
    listener: Arc<dyn MeasurementListener>,
    state: Arc<Mutex<MeterState>>,
    running: Option<RunningSession>,
}

impl MeasurementSession {
    pub fn new(config: MeterConfig, listener: Arc<dyn MeasurementListener>) -> Self {
        let state = MeterState {
            band: config.frequency.band,
            ..Default::default()
        };

        Self {
            config,
            listener,
            state: Arc::new(Mutex::new(state)),
            running: None,
        }
    }

    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Copy of the latest meter state
    pub fn snapshot(&self) -> MeterState {
        self.state.lock().clone()
    }

    /// Change the frequency search band; takes effect on the next frequency tick
    pub fn configure_band(&self, low_hz: i32, high_hz: i32) {
        let band = FrequencyBand::new(low_hz, high_hz);
        self.state.lock().band = band;
        log::debug!("Frequency band set to {}..{} Hz", low_hz, high_hz);
    }

    pub fn band(&self) -> FrequencyBand {
        self.state.lock().band
    }

    /// Bin range the next frequency tick will search, if running
    pub fn effective_bins(&self) -> Option<Range<usize>> {
        let running = self.running.as_ref()?;
        let band = self.state.lock().band;
        let window_len = self.config.window_size;

        Some(if self.config.frequency.band_limited {
            band.bins(running.driver.sample_rate(), window_len)
        } else {
            0..window_len
        })
    }

    /// Open the configured microphone and start measuring.
    ///
    /// No-op when already running.
    pub async fn start_microphone(&mut self) -> Result<(), SessionError> {
        if self.is_running() {
            log::debug!("Measurement session already running");
            return Ok(());
        }

        self.config.validate()?;

        let config = self.config.clone();
        let driver = tokio::task::spawn_blocking(move || MicrophoneDriver::open(&config))
            .await
            .map_err(|e| SessionError::Join(e.to_string()))??;

        log::info!("Metering {}", driver.device_name());
        self.start(Arc::new(driver))
    }

    /// Start measuring from `driver`. No-op when already running.
    pub fn start(&mut self, driver: Arc<dyn AudioDriver>) -> Result<(), SessionError> {
        if self.is_running() {
            log::debug!("Measurement session already running");
            return Ok(());
        }

        self.config.validate()?;

        let sample_rate = driver.sample_rate();
        if sample_rate == 0 {
            return Err(SessionError::NoDevice(
                "driver reports no sample rate".to_string(),
            ));
        }
        if driver.window_len() != self.config.window_size {
            return Err(SessionError::WindowMismatch {
                expected: self.config.window_size,
                actual: driver.window_len(),
            });
        }

        {
            let mut state = self.state.lock();
            state.running = true;
            state.sample_rate = Some(sample_rate);
            state.clear_readings();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let meter = || MeterContext {
            driver: driver.clone(),
            state: self.state.clone(),
            listener: self.listener.clone(),
            shutdown_rx: shutdown_rx.clone(),
        };

        let tasks = vec![
            tokio::spawn(run_amplitude_meter(meter(), self.config.clone())),
            tokio::spawn(run_frequency_meter(meter(), self.config.clone())),
        ];

        log::info!(
            "Measurement session started ({} Hz, window {}, amplitude every {:?}, frequency every {:?})",
            sample_rate,
            self.config.window_size,
            self.config.amplitude_interval(),
            self.config.frequency_interval(),
        );

        self.running = Some(RunningSession {
            shutdown_tx,
            tasks,
            driver,
        });

        Ok(())
    }

    /// Stop measuring and release the driver. No-op when idle.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        {
            // Signalled under the state lock so no meter publishes after this
            let mut state = self.state.lock();
            let _ = running.shutdown_tx.send(true);
            state.running = false;
            state.sample_rate = None;
            state.clear_readings();
        }

        for task in &running.tasks {
            task.abort();
        }
        release_driver(running.tasks, running.driver);

        log::info!("Measurement session stopped");
    }
}

/// Drop the driver on a blocking thread once both meters have let go of it.
///
/// Dropping a `MicrophoneDriver` joins its capture thread.
fn release_driver(tasks: Vec<JoinHandle<()>>, driver: Arc<dyn AudioDriver>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                for task in tasks {
                    let _ = task.await;
                }
                let _ = tokio::task::spawn_blocking(move || drop(driver)).await;
            });
        }
        Err(_) => drop(driver),
    }
}

impl Drop for MeasurementSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything a meter task needs from its session
struct MeterContext {
    driver: Arc<dyn AudioDriver>,
    state: Arc<Mutex<MeterState>>,
    listener: Arc<dyn MeasurementListener>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MeterContext {
    /// Apply `update` unless the session has been stopped
    fn publish(&self, update: impl FnOnce(&mut MeterState)) -> bool {
        let mut state = self.state.lock();
        if *self.shutdown_rx.borrow() {
            return false;
        }
        update(&mut state);
        true
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn run_amplitude_meter(mut meter: MeterContext, config: MeterConfig) {
    let estimator = AmplitudeEstimator::from_config(&config.amplitude);
    let mut smoother = Smoother::new(config.amplitude.smoothing_depth);
    let mut samples = vec![0.0f32; config.window_size];
    let mut interval = ticker(config.amplitude_interval());

    loop {
        tokio::select! {
            biased;
            _ = meter.shutdown_rx.changed() => break,
            _ = interval.tick() => {
                meter.driver.latest_samples(&mut samples);
                let raw_db = estimator.estimate(&samples);
                let reading = AmplitudeReading {
                    smoothed_db: smoother.push(raw_db),
                    raw_db,
                };

                let published = meter.publish(|state| {
                    state.amplitude = Some(reading);
                    state.amplitude_updates += 1;
                });
                if !published {
                    break;
                }

                log::debug!("Amplitude {:.1} dB (raw {:.1})", reading.smoothed_db, raw_db);
                meter.listener.on_amplitude_updated(&reading);
            }
        }
    }
}

async fn run_frequency_meter(mut meter: MeterContext, config: MeterConfig) {
    let window_len = config.window_size;
    let sample_rate = meter.driver.sample_rate();
    let estimator = FrequencyEstimator::from_config(&config.frequency, sample_rate, window_len);
    let mut smoother = Smoother::new(config.frequency.smoothing_depth);
    let mut spectrum = vec![0.0f32; window_len];
    let mut interval = ticker(config.frequency_interval());

    loop {
        tokio::select! {
            biased;
            _ = meter.shutdown_rx.changed() => break,
            _ = interval.tick() => {
                // One band snapshot per tick
                let band = meter.state.lock().band;
                let bins = if config.frequency.band_limited {
                    band.bins(sample_rate, window_len)
                } else {
                    0..window_len
                };

                meter.driver.latest_spectrum(config.window, &mut spectrum);
                let raw = estimator.estimate(&spectrum, bins);

                if !raw.is_detected() && config.frequency.hold_on_no_peak {
                    log::trace!("No spectral peak, holding frequency");
                    continue;
                }

                let reading = FrequencyReading {
                    smoothed_hz: smoother.push(raw.frequency()),
                    raw,
                };

                let published = meter.publish(|state| {
                    state.frequency = Some(reading);
                    state.frequency_updates += 1;
                });
                if !published {
                    break;
                }

                log::debug!("Frequency {:.1} Hz ({:?})", reading.smoothed_hz, raw);
                meter.listener.on_frequency_updated(&reading);
            }
        }
    }
}

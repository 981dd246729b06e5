//! Microphone capture using a dedicated thread

use super::driver::{AudioDriver, InputBuffer};
use super::sources::{find_input_device, SourceError};
use super::{MeterConfig, WindowFunction};
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Audio capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    #[error("Failed to build audio stream: {0}")]
    StreamError(String),

    #[error("Failed to start stream: {0}")]
    PlayError(String),

    #[error("No samples from {device} within {timeout:?}")]
    NoSamples { device: String, timeout: Duration },

    #[error("Audio device did not open within {timeout:?}")]
    StartupTimeout { timeout: Duration },

    #[error("Thread error: {0}")]
    ThreadError(String),
}

impl CaptureError {
    /// Whether the failure means there is no usable input device
    pub fn is_no_device(&self) -> bool {
        matches!(
            self,
            CaptureError::Source(SourceError::NoInputDevice)
                | CaptureError::Source(SourceError::DeviceNotFound(_))
                | CaptureError::NoSamples { .. }
                | CaptureError::StartupTimeout { .. }
        )
    }
}

/// Commands sent to the audio thread
enum AudioCommand {
    Stop,
}

type StartupResult = Result<(Arc<InputBuffer>, String), CaptureError>;

/// Microphone driver.
///
/// The cpal stream lives on its own thread (streams are not `Send` on every
/// host); the data callback feeds a shared [`InputBuffer`] that the meters
/// read from.
pub struct MicrophoneDriver {
    input: Arc<InputBuffer>,
    device_name: String,
    command_tx: mpsc::Sender<AudioCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MicrophoneDriver {
    /// Open the configured input device and wait for its first samples.
    ///
    /// Thread startup and the first samples share one `device_timeout_ms` budget.
    pub fn open(config: &MeterConfig) -> Result<Self, CaptureError> {
        let timeout = config.device_timeout();
        let deadline = Instant::now() + timeout;
        let source_id = config.source_id.clone();
        let window_len = config.window_size;

        let (command_tx, command_rx) = mpsc::channel();
        let (startup_tx, startup_rx) = mpsc::sync_channel::<StartupResult>(1);

        let thread_handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || run_audio_thread(source_id, window_len, startup_tx, command_rx))
            .map_err(|e| CaptureError::ThreadError(e.to_string()))?;

        let (input, device_name) = match startup_rx.recv_timeout(timeout) {
            Ok(Ok(started)) => started,
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                return Err(e);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Dropping command_tx lets the thread exit once cpal returns
                log::warn!("Audio device did not open within {:?}", timeout);
                return Err(CaptureError::StartupTimeout { timeout });
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = thread_handle.join();
                return Err(CaptureError::ThreadError(
                    "audio thread exited during startup".to_string(),
                ));
            }
        };

        let driver = Self {
            input,
            device_name,
            command_tx,
            thread_handle: Some(thread_handle),
        };

        await_first_samples(&driver.input, &driver.device_name, deadline, timeout)?;

        log::info!("Audio capture started: {}", driver.device_name);
        Ok(driver)
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Stop the stream and join the audio thread
    pub fn stop(&mut self) {
        let _ = self.command_tx.send(AudioCommand::Stop);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MicrophoneDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl AudioDriver for MicrophoneDriver {
    fn sample_rate(&self) -> u32 {
        self.input.sample_rate()
    }

    fn window_len(&self) -> usize {
        self.input.window_len()
    }

    fn latest_samples(&self, out: &mut [f32]) {
        self.input.latest_samples(out);
    }

    fn latest_spectrum(&self, window: WindowFunction, out: &mut [f32]) {
        self.input.latest_spectrum(window, out);
    }
}

/// Wait for the first samples until `deadline`; `timeout` is the whole budget, for the error
fn await_first_samples(
    input: &InputBuffer,
    device_name: &str,
    deadline: Instant,
    timeout: Duration,
) -> Result<(), CaptureError> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if input.wait_for_samples(remaining) {
        return Ok(());
    }

    log::warn!("No samples from {} within {:?}", device_name, timeout);
    Err(CaptureError::NoSamples {
        device: device_name.to_string(),
        timeout,
    })
}

/// Run the audio stream in a dedicated thread until told to stop
fn run_audio_thread(
    source_id: Option<String>,
    window_len: usize,
    startup_tx: mpsc::SyncSender<StartupResult>,
    command_rx: mpsc::Receiver<AudioCommand>,
) {
    let stream = match start_stream(source_id.as_deref(), window_len) {
        Ok((stream, input, device_name)) => {
            let _ = startup_tx.send(Ok((input, device_name)));
            stream
        }
        Err(e) => {
            log::error!("Audio capture failed to start: {}", e);
            let _ = startup_tx.send(Err(e));
            return;
        }
    };

    match command_rx.recv() {
        Ok(AudioCommand::Stop) => log::info!("Audio capture stopping"),
        Err(_) => log::info!("Audio capture channel disconnected"),
    }

    drop(stream);
}

fn start_stream(
    source_id: Option<&str>,
    window_len: usize,
) -> Result<(cpal::Stream, Arc<InputBuffer>, String), CaptureError> {
    let host = cpal::default_host();
    let device = find_input_device(&host, source_id)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    log_device_caps(&device, &device_name);

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::ConfigError(e.to_string()))?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    log::info!(
        "Audio capture: {} ({} Hz, {} channels)",
        device_name,
        sample_rate,
        channels
    );

    let input = Arc::new(InputBuffer::new(sample_rate, window_len));

    let stream = match config.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), input.clone(), channels),
        SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), input.clone(), channels),
        SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), input.clone(), channels),
        other => {
            return Err(CaptureError::ConfigError(format!(
                "Unsupported sample format {:?}",
                other
            )))
        }
    }
    .map_err(|e| CaptureError::StreamError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| CaptureError::PlayError(e.to_string()))?;

    Ok((stream, input, device_name))
}

/// Log the sample-rate range the device supports
fn log_device_caps(device: &Device, device_name: &str) {
    match device.supported_input_configs() {
        Ok(configs) => {
            let (min, max) = configs.fold((u32::MAX, 0u32), |(min, max), range| {
                (
                    min.min(range.min_sample_rate().0),
                    max.max(range.max_sample_rate().0),
                )
            });
            if max > 0 {
                log::info!("{} min frequency: {} max frequency: {}", device_name, min, max);
            }
        }
        Err(e) => log::debug!("Could not query {} capabilities: {}", device_name, e),
    }
}

/// Build audio stream for given sample type
fn build_stream<T: cpal::Sample + cpal::SizedSample>(
    device: &Device,
    config: &StreamConfig,
    input: Arc<InputBuffer>,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    f32: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let f32_data: Vec<f32> = data
                .iter()
                .map(|s| cpal::Sample::from_sample(*s))
                .collect();

            input.push_interleaved(&f32_data, channels);
        },
        |err| {
            log::error!("Audio stream error: {}", err);
        },
        None,
    )
}

//! Audio input source enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of source IDs naming a specific input device
const INPUT_PREFIX: &str = "input:";

/// Audio source information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSource {
    /// Unique identifier for the source
    pub id: String,

    /// Display name
    pub name: String,

    /// Source type
    pub source_type: SourceType,
}

/// Type of audio source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Host default input (follows OS settings)
    DefaultInput,

    /// Named input device (microphone)
    InputDevice,
}

/// Audio source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No input device available")]
    NoInputDevice,

    #[error("Failed to enumerate devices: {0}")]
    EnumerationError(String),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

/// List available input sources, default first
pub fn list_sources() -> Result<Vec<AudioSource>, SourceError> {
    let host = cpal::default_host();
    let mut sources = Vec::new();

    if let Some(device) = host.default_input_device() {
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        sources.push(AudioSource {
            id: "default".to_string(),
            name: format!("Default Input ({})", device_name),
            source_type: SourceType::DefaultInput,
        });
    }

    let devices = host
        .input_devices()
        .map_err(|e| SourceError::EnumerationError(e.to_string()))?;
    for device in devices {
        if let Ok(name) = device.name() {
            sources.push(input_source(&name));
        }
    }

    Ok(sources)
}

fn input_source(name: &str) -> AudioSource {
    AudioSource {
        id: format!("{}{}", INPUT_PREFIX, name),
        name: format!("Input: {}", name),
        source_type: SourceType::InputDevice,
    }
}

/// Device name a source ID refers to; `None` means the host default
pub(crate) fn device_name_for(source_id: Option<&str>) -> Option<&str> {
    match source_id {
        None | Some("") | Some("default") => None,
        Some(id) => Some(id.strip_prefix(INPUT_PREFIX).unwrap_or(id)),
    }
}

/// Resolve a source ID to an input device
pub(crate) fn find_input_device(host: &Host, source_id: Option<&str>) -> Result<Device, SourceError> {
    match device_name_for(source_id) {
        None => host.default_input_device().ok_or(SourceError::NoInputDevice),
        Some(device_name) => host
            .input_devices()
            .map_err(|e| SourceError::EnumerationError(e.to_string()))?
            .find(|d| d.name().map(|n| n == device_name).unwrap_or(false))
            .ok_or_else(|| SourceError::DeviceNotFound(device_name.to_string())),
    }
}

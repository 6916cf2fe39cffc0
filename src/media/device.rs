//! Input device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use crate::error::CaptureError;
use crate::media::source::SourceKind;

/// Description of an audio input device
#[derive(Debug, Clone, Serialize)]
pub struct InputDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all available microphone inputs
pub fn list_input_devices() -> Vec<InputDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device.name() {
                let (sample_rates, channels) = input_capabilities(&device);
                devices.push(InputDeviceInfo {
                    id: format!("input:{}", name),
                    is_default: default_name.as_ref() == Some(&name),
                    name,
                    sample_rates,
                    channels,
                });
            }
        }
    }

    devices
}

fn input_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_input_configs() {
        for config in configs {
            for rate_val in [44100u32, 48000, 96000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            if !channels.contains(&config.channels()) {
                channels.push(config.channels());
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();
    (sample_rates, channels)
}

/// Resolve an input device by id, or the host default when `id` is `None`
pub fn input_device(id: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let denied = |reason: String| CaptureError::AcquisitionDenied {
        kind: SourceKind::Microphone,
        reason,
    };

    let Some(id) = id else {
        return host
            .default_input_device()
            .ok_or_else(|| denied("no default input device".to_string()));
    };

    let name = id.strip_prefix("input:").unwrap_or(id);
    let inputs = host
        .input_devices()
        .map_err(|e| CaptureError::Device(e.to_string()))?;

    for device in inputs {
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    Err(denied(format!("input device not found: {}", id)))
}

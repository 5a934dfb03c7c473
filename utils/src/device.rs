use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;

use crate::capture::CaptureError;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

fn find_device<I>(devices: I, target: &str) -> Option<Device>
where
    I: Iterator<Item = Device>,
{
    devices.into_iter().find(|d| d.name().is_ok_and(|name| name == target))
}

/// Looks up an input device by name, falling back to the host default.
pub fn get_or_default_input(device_name: Option<String>) -> Result<Device, CaptureError> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable("no default input device".to_string())),
        Some(name) => {
            let devices = host.input_devices().map_err(|e| CaptureError::classify(e.to_string()))?;
            find_device(devices, &name)
                .ok_or_else(|| CaptureError::DeviceUnavailable(format!("no input device named {name:?}")))
        }
    }
}

pub fn get_or_default_output(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    match device_name {
        None => host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no default output device")),
        Some(name) => {
            let devices = host.output_devices()?;
            find_device(devices, &name).ok_or_else(|| anyhow::anyhow!("no output device named {name:?}"))
        }
    }
}

fn describe(device: &Device, default_name: Option<&str>, config: Option<cpal::SupportedStreamConfig>) -> Option<String> {
    let name = device.name().ok()?;
    let mut d = match config {
        Some(cfg) => format!(" * {}({}ch, {}hz)", name, cfg.channels(), cfg.sample_rate().0),
        None => format!(" * {}", name),
    };
    if default_name == Some(name.as_str()) {
        d.push_str(" [default]");
    }
    Some(d)
}

pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let device_names: Vec<String> = host
        .input_devices()?
        .filter_map(|d| describe(&d, default_name.as_deref(), d.default_input_config().ok()))
        .collect();
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_name = host.default_output_device().and_then(|d| d.name().ok());
    let device_names: Vec<String> = host
        .output_devices()?
        .filter_map(|d| describe(&d, default_name.as_deref(), d.default_output_config().ok()))
        .collect();
    Ok(device_names.join("\n"))
}

//! Input device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use thiserror::Error;

/// Audio source errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Enumeration is not supported: {0}")]
    EnumerationUnsupported(String),
}

/// List input device names on the default host, in host order.
///
/// Devices whose name cannot be read are skipped.
pub fn list_input_devices() -> Result<Vec<String>, SourceError> {
    let host = cpal::default_host();
    log::debug!("Enumerating input devices on host {:?}", host.id());

    let devices = host
        .input_devices()
        .map_err(|e| SourceError::EnumerationUnsupported(e.to_string()))?;

    Ok(collect_names(devices.map(|d| d.name().ok())))
}

fn collect_names(names: impl Iterator<Item = Option<String>>) -> Vec<String> {
    names
        .flatten()
        .filter(|name| !name.is_empty())
        .collect()
}

//! Analog device settings, covering the single implicit device of older
//! protocol versions and the per-channel device list that replaced it.

use qtm_xml::{Document, Element};
use tracing::{debug, warn};

use crate::value::{push_f32, push_str, push_u32, required_child, required_parsed, required_text};
use crate::version::{Feature, ProtocolVersion};
use crate::{SettingsError, SETTINGS_ROOT};

/// One analog acquisition device.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalogDevice {
    pub device_id: u32,
    pub name: String,
    pub channels: u32,
    pub frequency: u32,
    /// Device-level unit; carried by the pre-per-channel schema.
    pub unit: Option<String>,
    pub labels: Vec<String>,
    pub units: Vec<String>,
    pub range_min: f32,
    pub range_max: f32,
}

impl Default for AnalogDevice {
    fn default() -> Self {
        AnalogDevice {
            device_id: 0,
            name: String::new(),
            channels: 0,
            frequency: 0,
            unit: None,
            labels: Vec::new(),
            units: Vec::new(),
            range_min: f32::NAN,
            range_max: f32::NAN,
        }
    }
}

/// The `Analog` settings section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalogSettings {
    pub devices: Vec<AnalogDevice>,
}

/// Read the `Analog` section, or `Ok(None)` when it is absent.
///
/// A device whose per-channel label or unit count disagrees with its
/// declared channel count is skipped with a warning.
pub fn read_analog_settings(
    root: &Element,
    version: ProtocolVersion,
) -> Result<Option<AnalogSettings>, SettingsError> {
    let Some(elem) = root.child("Analog") else {
        return Ok(None);
    };

    let mut devices = Vec::new();
    if version.supports(Feature::PerChannelAnalogMeta) {
        for device_elem in elem.children("Device") {
            match read_device(device_elem) {
                Ok(device) => devices.push(device),
                Err(err) => warn!(error = %err, "skipping unreadable analog device"),
            }
        }
    } else {
        devices.push(read_implicit_device(elem)?);
    }

    debug!(devices = devices.len(), "read analog settings");
    Ok(Some(AnalogSettings { devices }))
}

fn read_device(elem: &Element) -> Result<AnalogDevice, SettingsError> {
    let mut device = AnalogDevice {
        device_id: required_parsed(elem, "Device_ID")?,
        name: required_text(elem, "Device_Name")?.to_string(),
        channels: required_parsed(elem, "Channels")?,
        frequency: required_parsed(elem, "Frequency")?,
        ..AnalogDevice::default()
    };

    let range = required_child(elem, "Range")?;
    device.range_min = required_parsed(range, "Min")?;
    device.range_max = required_parsed(range, "Max")?;

    for channel_elem in elem.children("Channel") {
        if let Some(label) = channel_elem.child_text("Label") {
            device.labels.push(label.to_string());
        }
        if let Some(unit) = channel_elem.child_text("Unit") {
            device.units.push(unit.to_string());
        }
    }
    if device.labels.len() != device.channels as usize
        || device.units.len() != device.channels as usize
    {
        return Err(SettingsError::CountMismatch(
            "Channel".into(),
            device.channels as usize,
            device.labels.len().min(device.units.len()),
        ));
    }
    Ok(device)
}

fn read_implicit_device(elem: &Element) -> Result<AnalogDevice, SettingsError> {
    let mut device = AnalogDevice {
        device_id: 1,
        name: "AnalogDevice".to_string(),
        channels: required_parsed(elem, "Channels")?,
        frequency: required_parsed(elem, "Frequency")?,
        unit: elem.child_text("Unit").map(str::to_string),
        ..AnalogDevice::default()
    };
    let range = required_child(elem, "Range")?;
    device.range_min = required_parsed(range, "Min")?;
    device.range_max = required_parsed(range, "Max")?;
    Ok(device)
}

/// Build a settings document carrying the `Analog` section.
///
/// Below the per-channel schema only the first device is representable.
pub fn write_analog_settings(settings: &AnalogSettings, version: ProtocolVersion) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("Analog"));

    if version.supports(Feature::PerChannelAnalogMeta) {
        for device in &settings.devices {
            write_device(elem, device);
        }
    } else if let Some(device) = settings.devices.first() {
        push_u32(elem, "Channels", device.channels);
        push_u32(elem, "Frequency", device.frequency);
        if let Some(unit) = &device.unit {
            push_str(elem, "Unit", unit);
        }
        write_range(elem, device);
    }

    Document::new(root)
}

fn write_device(parent: &mut Element, device: &AnalogDevice) {
    let elem = parent.push(Element::new("Device"));
    push_u32(elem, "Device_ID", device.device_id);
    push_str(elem, "Device_Name", &device.name);
    push_u32(elem, "Channels", device.channels);
    push_u32(elem, "Frequency", device.frequency);
    write_range(elem, device);
    for (label, unit) in device.labels.iter().zip(&device.units) {
        let channel_elem = elem.push(Element::new("Channel"));
        push_str(channel_elem, "Label", label);
        push_str(channel_elem, "Unit", unit);
    }
}

fn write_range(parent: &mut Element, device: &AnalogDevice) {
    let range = parent.push(Element::new("Range"));
    push_f32(range, "Min", device.range_min, 3);
    push_f32(range, "Max", device.range_max, 3);
}

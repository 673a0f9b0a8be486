//! Eye tracker device settings.

use qtm_xml::{Document, Element};
use tracing::{debug, warn};

use crate::value::{child_f32_or_nan, optional_bool, push_bool, push_f32, push_str, required_text};
use crate::{SettingsError, SETTINGS_ROOT};

/// One configured eye tracker device.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeTracker {
    pub name: String,
    pub frequency: f32,
    pub hardware_sync: Option<bool>,
}

impl Default for EyeTracker {
    fn default() -> Self {
        EyeTracker {
            name: String::new(),
            frequency: f32::NAN,
            hardware_sync: None,
        }
    }
}

/// Read the `Eye_Tracker` section, or `Ok(None)` when it is absent.
pub fn read_eye_tracker_settings(
    root: &Element,
) -> Result<Option<Vec<EyeTracker>>, SettingsError> {
    let Some(elem) = root.child("Eye_Tracker") else {
        return Ok(None);
    };

    let mut devices = Vec::new();
    for device_elem in elem.children("Device") {
        match read_device(device_elem) {
            Ok(device) => devices.push(device),
            Err(err) => warn!(error = %err, "skipping unreadable eye tracker device"),
        }
    }
    debug!(devices = devices.len(), "read eye tracker settings");
    Ok(Some(devices))
}

fn read_device(elem: &Element) -> Result<EyeTracker, SettingsError> {
    Ok(EyeTracker {
        name: required_text(elem, "Name")?.to_string(),
        frequency: child_f32_or_nan(elem, "Frequency"),
        hardware_sync: optional_bool(elem, "Hardware_Sync")?,
    })
}

/// Build a settings document carrying the `Eye_Tracker` section.
pub fn write_eye_tracker_settings(devices: &[EyeTracker]) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("Eye_Tracker"));
    for device in devices {
        let device_elem = elem.push(Element::new("Device"));
        push_str(device_elem, "Name", &device.name);
        push_f32(device_elem, "Frequency", device.frequency, 3);
        if let Some(value) = device.hardware_sync {
            push_bool(device_elem, "Hardware_Sync", value);
        }
    }
    Document::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtm_xml::Document;

    const EYE_TRACKER_FIXTURE: &str = r#"
        <QTM_Parameters_Ver_1.25>
            <Eye_Tracker>
                <Device>
                    <Name>Tobii Glasses</Name>
                    <Frequency>100.000</Frequency>
                    <Hardware_Sync>True</Hardware_Sync>
                </Device>
            </Eye_Tracker>
        </QTM_Parameters_Ver_1.25>
    "#;

    #[test]
    fn reads_devices() {
        let doc = Document::parse(EYE_TRACKER_FIXTURE).expect("parse fixture");
        let devices = read_eye_tracker_settings(doc.root())
            .expect("read")
            .expect("eye tracker present");
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Tobii Glasses");
        assert_eq!(devices[0].frequency, 100.0);
        assert_eq!(devices[0].hardware_sync, Some(true));
    }

    #[test]
    fn garbled_sync_flag_skips_the_device() {
        let xml = EYE_TRACKER_FIXTURE
            .replace("<Hardware_Sync>True</Hardware_Sync>", "<Hardware_Sync>yes</Hardware_Sync>");
        let doc = Document::parse(&xml).expect("parse");
        let devices = read_eye_tracker_settings(doc.root())
            .expect("read")
            .expect("eye tracker present");
        assert!(devices.is_empty());
    }

    #[test]
    fn absent_section_is_none() {
        let doc = Document::parse("<QTM_Parameters_Ver_1.25><General/></QTM_Parameters_Ver_1.25>")
            .expect("parse");
        assert!(read_eye_tracker_settings(doc.root()).expect("read").is_none());
    }

    #[test]
    fn round_trip_preserves_devices() {
        let doc = Document::parse(EYE_TRACKER_FIXTURE).expect("parse fixture");
        let devices = read_eye_tracker_settings(doc.root())
            .expect("read")
            .expect("eye tracker present");

        let written = write_eye_tracker_settings(&devices);
        let reread = read_eye_tracker_settings(written.root())
            .expect("reread")
            .expect("eye tracker present");
        assert_eq!(reread, devices);
    }
}

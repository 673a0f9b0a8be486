//! Gaze vector settings.

use qtm_xml::{Document, Element};
use tracing::{debug, warn};

use crate::value::{child_f32_or_nan, optional_bool, push_bool, push_f32, push_str, required_text};
use crate::{SettingsError, SETTINGS_ROOT};

/// One configured gaze vector.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeVector {
    pub name: String,
    pub frequency: f32,
    pub hardware_sync: Option<bool>,
    pub filter: Option<bool>,
}

impl Default for GazeVector {
    fn default() -> Self {
        GazeVector {
            name: String::new(),
            frequency: f32::NAN,
            hardware_sync: None,
            filter: None,
        }
    }
}

/// Read the `Gaze_Vector` section, or `Ok(None)` when it is absent.
pub fn read_gaze_vector_settings(
    root: &Element,
) -> Result<Option<Vec<GazeVector>>, SettingsError> {
    let Some(elem) = root.child("Gaze_Vector") else {
        return Ok(None);
    };

    let mut vectors = Vec::new();
    for vector_elem in elem.children("Vector") {
        match read_vector(vector_elem) {
            Ok(vector) => vectors.push(vector),
            Err(err) => warn!(error = %err, "skipping unreadable gaze vector"),
        }
    }
    debug!(vectors = vectors.len(), "read gaze vector settings");
    Ok(Some(vectors))
}

fn read_vector(elem: &Element) -> Result<GazeVector, SettingsError> {
    Ok(GazeVector {
        name: required_text(elem, "Name")?.to_string(),
        frequency: child_f32_or_nan(elem, "Frequency"),
        hardware_sync: optional_bool(elem, "Hardware_Sync")?,
        filter: optional_bool(elem, "Filter")?,
    })
}

/// Build a settings document carrying the `Gaze_Vector` section.
pub fn write_gaze_vector_settings(vectors: &[GazeVector]) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("Gaze_Vector"));
    for vector in vectors {
        let vector_elem = elem.push(Element::new("Vector"));
        push_str(vector_elem, "Name", &vector.name);
        push_f32(vector_elem, "Frequency", vector.frequency, 3);
        if let Some(value) = vector.hardware_sync {
            push_bool(vector_elem, "Hardware_Sync", value);
        }
        if let Some(value) = vector.filter {
            push_bool(vector_elem, "Filter", value);
        }
    }
    Document::new(root)
}

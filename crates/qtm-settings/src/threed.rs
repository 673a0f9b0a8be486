//! 3D tracking settings: axis orientation, labelled trajectories and bones.

use qtm_xml::{Document, Element};
use tracing::debug;

use crate::value::{pack_rgb, push_str, push_u32, required_attr_text, required_parsed};
use crate::{SettingsError, SETTINGS_ROOT};

/// Axis pointing upwards in the coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    #[default]
    PositiveZ,
    NegativeZ,
}

impl Axis {
    pub const ALL: [Axis; 6] = [
        Axis::PositiveX,
        Axis::NegativeX,
        Axis::PositiveY,
        Axis::NegativeY,
        Axis::PositiveZ,
        Axis::NegativeZ,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            Axis::PositiveX => "+X",
            Axis::NegativeX => "-X",
            Axis::PositiveY => "+Y",
            Axis::NegativeY => "-Y",
            Axis::PositiveZ => "+Z",
            Axis::NegativeZ => "-Z",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|axis| axis.wire_name().eq_ignore_ascii_case(text))
    }
}

/// One labelled trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Label3d {
    pub name: String,
    /// Packed RGB, red in the low byte.
    pub color: u32,
    pub trajectory_type: Option<String>,
}

/// A bone drawn between two labelled trajectories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bone {
    pub from: String,
    pub to: String,
    pub color: u32,
}

const DEFAULT_BONE_COLOR: u32 = pack_rgb(255, 255, 255);

/// The `The_3D` settings section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings3d {
    pub axis_upwards: Axis,
    pub calibration_time: String,
    pub labels: Vec<Label3d>,
    pub bones: Vec<Bone>,
}

/// Read the `The_3D` section, or `Ok(None)` when it is absent.
///
/// The label list is strict: the `Labels` element declares how many
/// `Label` children follow, and a mismatch is an error.
pub fn read_3d_settings(root: &Element) -> Result<Option<Settings3d>, SettingsError> {
    let Some(elem) = root.child("The_3D") else {
        return Ok(None);
    };

    let axis_upwards = match elem.child_text("AxisUpwards") {
        Some(text) => Axis::from_wire(text)
            .ok_or_else(|| SettingsError::InvalidValue("AxisUpwards".into(), text.into()))?,
        None => Axis::default(),
    };

    let declared: usize = required_parsed(elem, "Labels")?;
    let mut labels = Vec::with_capacity(declared);
    for label_elem in elem.children("Label") {
        labels.push(read_label(label_elem)?);
    }
    if labels.len() != declared {
        return Err(SettingsError::CountMismatch(
            "Label".into(),
            declared,
            labels.len(),
        ));
    }

    let mut bones = Vec::new();
    if let Some(bones_elem) = elem.child("Bones") {
        for bone_elem in bones_elem.children("Bone") {
            bones.push(read_bone(bone_elem)?);
        }
    }

    debug!(labels = labels.len(), bones = bones.len(), "read 3d settings");
    Ok(Some(Settings3d {
        axis_upwards,
        calibration_time: elem.child_text("CalibrationTime").unwrap_or_default().to_string(),
        labels,
        bones,
    }))
}

fn read_label(elem: &Element) -> Result<Label3d, SettingsError> {
    Ok(Label3d {
        name: elem.child_text("Name").unwrap_or_default().to_string(),
        color: required_parsed(elem, "RGBColor")?,
        trajectory_type: elem.child_text("Trajectory_Type").map(str::to_string),
    })
}

fn read_bone(elem: &Element) -> Result<Bone, SettingsError> {
    let from = required_attr_text(elem, "From")?;
    let to = required_attr_text(elem, "To")?;
    let color = match elem.attribute("Color") {
        Some(text) => text
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidValue("Color".into(), text.into()))?,
        None => DEFAULT_BONE_COLOR,
    };
    Ok(Bone {
        from: from.to_string(),
        to: to.to_string(),
        color,
    })
}

/// Build a settings document carrying the `The_3D` section.
pub fn write_3d_settings(settings: &Settings3d) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("The_3D"));

    push_str(elem, "AxisUpwards", settings.axis_upwards.wire_name());
    push_str(elem, "CalibrationTime", &settings.calibration_time);
    push_u32(elem, "Labels", settings.labels.len() as u32);
    for label in &settings.labels {
        let label_elem = elem.push(Element::new("Label"));
        push_str(label_elem, "Name", &label.name);
        push_u32(label_elem, "RGBColor", label.color);
        if let Some(trajectory) = &label.trajectory_type {
            push_str(label_elem, "Trajectory_Type", trajectory);
        }
    }
    if !settings.bones.is_empty() {
        let bones_elem = elem.push(Element::new("Bones"));
        for bone in &settings.bones {
            bones_elem.push(
                Element::new("Bone")
                    .with_attribute("From", bone.from.as_str())
                    .with_attribute("To", bone.to.as_str())
                    .with_attribute("Color", bone.color.to_string().as_str()),
            );
        }
    }

    Document::new(root)
}

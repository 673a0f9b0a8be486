//! Calibration result settings. The `calibration` section uses a
//! lowercase, attribute-heavy schema unlike the rest of the parameter
//! document, and its booleans take the lenient parser.

use qtm_xml::{Document, Element};
use tracing::debug;

use crate::value::{
    attr_f64_or_nan, attr_value, required_attr, required_attr_text, required_child, set_attr_f64,
};
use crate::{SettingsError, SETTINGS_ROOT};

/// How the calibration was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalibrationType {
    #[default]
    Regular,
    Refine,
    Fixed,
}

impl CalibrationType {
    pub const ALL: [CalibrationType; 3] = [
        CalibrationType::Regular,
        CalibrationType::Refine,
        CalibrationType::Fixed,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            CalibrationType::Regular => "regular",
            CalibrationType::Refine => "refine",
            CalibrationType::Fixed => "fixed",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(text))
    }
}

/// Field-of-view rectangle in sensor pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationFov {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Rigid camera pose: translation plus a row-major 3x3 rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTransform {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub rotation: [f64; 9],
}

impl Default for CalibrationTransform {
    fn default() -> Self {
        CalibrationTransform {
            x: f64::NAN,
            y: f64::NAN,
            z: f64::NAN,
            rotation: [f64::NAN; 9],
        }
    }
}

/// Lens and sensor parameters of a calibrated camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationIntrinsic {
    pub focal_length: f64,
    pub sensor_min_u: f64,
    pub sensor_max_u: f64,
    pub sensor_min_v: f64,
    pub sensor_max_v: f64,
    pub focal_length_u: f64,
    pub focal_length_v: f64,
    pub center_point_u: f64,
    pub center_point_v: f64,
    pub skew: f64,
    pub radial_distortion: [f64; 3],
    pub tangential_distortion: [f64; 2],
}

impl Default for CalibrationIntrinsic {
    fn default() -> Self {
        CalibrationIntrinsic {
            focal_length: f64::NAN,
            sensor_min_u: f64::NAN,
            sensor_max_u: f64::NAN,
            sensor_min_v: f64::NAN,
            sensor_max_v: f64::NAN,
            focal_length_u: f64::NAN,
            focal_length_v: f64::NAN,
            center_point_u: f64::NAN,
            center_point_v: f64::NAN,
            skew: f64::NAN,
            radial_distortion: [f64::NAN; 3],
            tangential_distortion: [f64::NAN; 2],
        }
    }
}

/// One camera of the calibration result.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationCamera {
    pub active: bool,
    pub calibrated: bool,
    pub message: String,
    pub point_count: u32,
    pub avg_residual: f64,
    pub serial: u32,
    pub model: String,
    pub view_rotation: u32,
    pub fov_marker: CalibrationFov,
    pub fov_marker_max: CalibrationFov,
    pub fov_video: CalibrationFov,
    pub fov_video_max: CalibrationFov,
    pub transform: CalibrationTransform,
    pub intrinsic: CalibrationIntrinsic,
}

/// The `calibration` settings section.
///
/// The numeric fields that do not apply to the calibration type keep
/// their NaN sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub calibrated: bool,
    pub source: String,
    pub created: String,
    pub qtm_version: String,
    pub kind: CalibrationType,
    pub refit_residual: f64,
    pub wand_length: f64,
    pub max_frames: Option<u32>,
    pub short_arm_end: f64,
    pub long_arm_end: f64,
    pub long_arm_middle: f64,
    pub result_std_dev: f64,
    pub result_min_max_diff: f64,
    pub cameras: Vec<CalibrationCamera>,
}

impl Default for Calibration {
    fn default() -> Self {
        Calibration {
            calibrated: false,
            source: String::new(),
            created: String::new(),
            qtm_version: String::new(),
            kind: CalibrationType::default(),
            refit_residual: f64::NAN,
            wand_length: f64::NAN,
            max_frames: None,
            short_arm_end: f64::NAN,
            long_arm_end: f64::NAN,
            long_arm_middle: f64::NAN,
            result_std_dev: f64::NAN,
            result_min_max_diff: f64::NAN,
            cameras: Vec::new(),
        }
    }
}

/// Read the `calibration` section, or `Ok(None)` when it is absent.
pub fn read_calibration_settings(root: &Element) -> Result<Option<Calibration>, SettingsError> {
    let Some(elem) = root.child("calibration") else {
        return Ok(None);
    };

    let kind_text = required_attr_text(elem, "type")?;
    let kind = CalibrationType::from_wire(kind_text)
        .ok_or_else(|| SettingsError::InvalidValue("type".into(), kind_text.into()))?;

    let mut calibration = Calibration {
        calibrated: required_attr(elem, "calibrated")?,
        source: required_attr_text(elem, "source")?.to_string(),
        created: required_attr_text(elem, "created")?.to_string(),
        qtm_version: required_attr_text(elem, "qtm-version")?.to_string(),
        kind,
        ..Calibration::default()
    };
    match kind {
        CalibrationType::Regular => {
            calibration.wand_length = attr_f64_or_nan(elem, "wandLength");
            calibration.max_frames = attr_value(elem, "maximumFrames");
            calibration.short_arm_end = attr_f64_or_nan(elem, "shortArmEnd");
            calibration.long_arm_end = attr_f64_or_nan(elem, "longArmEnd");
            calibration.long_arm_middle = attr_f64_or_nan(elem, "longArmMiddle");
        }
        CalibrationType::Refine => {
            calibration.refit_residual = attr_f64_or_nan(elem, "refit-residual");
        }
        CalibrationType::Fixed => {}
    }
    if let Some(results) = elem.child("results") {
        calibration.result_std_dev = attr_f64_or_nan(results, "std-dev");
        calibration.result_min_max_diff = attr_f64_or_nan(results, "min-max-diff");
    }

    if let Some(cameras_elem) = elem.child("cameras") {
        for camera_elem in cameras_elem.children("camera") {
            calibration.cameras.push(read_camera(camera_elem)?);
        }
    }

    debug!(cameras = calibration.cameras.len(), "read calibration settings");
    Ok(Some(calibration))
}

fn read_camera(elem: &Element) -> Result<CalibrationCamera, SettingsError> {
    Ok(CalibrationCamera {
        active: required_attr(elem, "active")?,
        calibrated: required_attr(elem, "calibrated")?,
        message: elem.attribute("message").unwrap_or_default().to_string(),
        point_count: required_attr(elem, "point-count")?,
        avg_residual: attr_f64_or_nan(elem, "avg-residual"),
        serial: required_attr(elem, "serial")?,
        model: required_attr_text(elem, "model")?.to_string(),
        view_rotation: required_attr(elem, "view-rotation")?,
        fov_marker: read_fov(required_child(elem, "fov_marker")?)?,
        fov_marker_max: read_fov(required_child(elem, "fov_marker_max")?)?,
        fov_video: read_fov(required_child(elem, "fov_video")?)?,
        fov_video_max: read_fov(required_child(elem, "fov_video_max")?)?,
        transform: read_transform(required_child(elem, "transform")?),
        intrinsic: read_intrinsic(required_child(elem, "intrinsic")?),
    })
}

fn read_fov(elem: &Element) -> Result<CalibrationFov, SettingsError> {
    Ok(CalibrationFov {
        left: required_attr(elem, "left")?,
        top: required_attr(elem, "top")?,
        right: required_attr(elem, "right")?,
        bottom: required_attr(elem, "bottom")?,
    })
}

fn read_transform(elem: &Element) -> CalibrationTransform {
    let mut rotation = [f64::NAN; 9];
    for (index, cell) in rotation.iter_mut().enumerate() {
        let name = format!("r{}{}", index / 3 + 1, index % 3 + 1);
        *cell = attr_f64_or_nan(elem, &name);
    }
    CalibrationTransform {
        x: attr_f64_or_nan(elem, "x"),
        y: attr_f64_or_nan(elem, "y"),
        z: attr_f64_or_nan(elem, "z"),
        rotation,
    }
}

fn read_intrinsic(elem: &Element) -> CalibrationIntrinsic {
    CalibrationIntrinsic {
        focal_length: attr_f64_or_nan(elem, "focallength"),
        sensor_min_u: attr_f64_or_nan(elem, "sensorMinU"),
        sensor_max_u: attr_f64_or_nan(elem, "sensorMaxU"),
        sensor_min_v: attr_f64_or_nan(elem, "sensorMinV"),
        sensor_max_v: attr_f64_or_nan(elem, "sensorMaxV"),
        focal_length_u: attr_f64_or_nan(elem, "focalLengthU"),
        focal_length_v: attr_f64_or_nan(elem, "focalLengthV"),
        center_point_u: attr_f64_or_nan(elem, "centerPointU"),
        center_point_v: attr_f64_or_nan(elem, "centerPointV"),
        skew: attr_f64_or_nan(elem, "skew"),
        radial_distortion: [
            attr_f64_or_nan(elem, "radialDistortion1"),
            attr_f64_or_nan(elem, "radialDistortion2"),
            attr_f64_or_nan(elem, "radialDistortion3"),
        ],
        tangential_distortion: [
            attr_f64_or_nan(elem, "tangentalDistortion1"),
            attr_f64_or_nan(elem, "tangentalDistortion2"),
        ],
    }
}

/// Build a settings document carrying the `calibration` section.
pub fn write_calibration_settings(calibration: &Calibration) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);

    let mut elem = Element::new("calibration")
        .with_attribute("calibrated", wire_bool(calibration.calibrated))
        .with_attribute("source", calibration.source.as_str())
        .with_attribute("created", calibration.created.as_str())
        .with_attribute("qtm-version", calibration.qtm_version.as_str())
        .with_attribute("type", calibration.kind.wire_name());
    set_attr_f64(&mut elem, "wandLength", calibration.wand_length, 6);
    if let Some(max_frames) = calibration.max_frames {
        elem.set_attribute("maximumFrames", max_frames.to_string());
    }
    set_attr_f64(&mut elem, "shortArmEnd", calibration.short_arm_end, 6);
    set_attr_f64(&mut elem, "longArmEnd", calibration.long_arm_end, 6);
    set_attr_f64(&mut elem, "longArmMiddle", calibration.long_arm_middle, 6);
    set_attr_f64(&mut elem, "refit-residual", calibration.refit_residual, 6);

    if !calibration.result_std_dev.is_nan() || !calibration.result_min_max_diff.is_nan() {
        let mut results = Element::new("results");
        set_attr_f64(&mut results, "std-dev", calibration.result_std_dev, 6);
        set_attr_f64(&mut results, "min-max-diff", calibration.result_min_max_diff, 6);
        elem.push(results);
    }

    let cameras_elem = elem.push(Element::new("cameras"));
    for camera in &calibration.cameras {
        write_camera(cameras_elem, camera);
    }

    root.push(elem);
    Document::new(root)
}

const fn wire_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn write_camera(parent: &mut Element, camera: &CalibrationCamera) {
    let mut elem = Element::new("camera")
        .with_attribute("active", wire_bool(camera.active))
        .with_attribute("calibrated", wire_bool(camera.calibrated))
        .with_attribute("message", camera.message.as_str());
    elem.set_attribute("point-count", camera.point_count.to_string());
    set_attr_f64(&mut elem, "avg-residual", camera.avg_residual, 6);
    elem.set_attribute("serial", camera.serial.to_string());
    elem.set_attribute("model", camera.model.as_str());
    elem.set_attribute("view-rotation", camera.view_rotation.to_string());

    elem.push(write_fov("fov_marker", camera.fov_marker));
    elem.push(write_fov("fov_marker_max", camera.fov_marker_max));
    elem.push(write_fov("fov_video", camera.fov_video));
    elem.push(write_fov("fov_video_max", camera.fov_video_max));
    elem.push(write_transform(&camera.transform));
    elem.push(write_intrinsic(&camera.intrinsic));

    parent.push(elem);
}

fn write_fov(name: &str, fov: CalibrationFov) -> Element {
    let mut elem = Element::new(name);
    elem.set_attribute("left", fov.left.to_string());
    elem.set_attribute("top", fov.top.to_string());
    elem.set_attribute("right", fov.right.to_string());
    elem.set_attribute("bottom", fov.bottom.to_string());
    elem
}

fn write_transform(transform: &CalibrationTransform) -> Element {
    let mut elem = Element::new("transform");
    set_attr_f64(&mut elem, "x", transform.x, 6);
    set_attr_f64(&mut elem, "y", transform.y, 6);
    set_attr_f64(&mut elem, "z", transform.z, 6);
    for (index, cell) in transform.rotation.iter().enumerate() {
        let name = format!("r{}{}", index / 3 + 1, index % 3 + 1);
        set_attr_f64(&mut elem, &name, *cell, 6);
    }
    elem
}

fn write_intrinsic(intrinsic: &CalibrationIntrinsic) -> Element {
    let mut elem = Element::new("intrinsic");
    set_attr_f64(&mut elem, "focallength", intrinsic.focal_length, 6);
    set_attr_f64(&mut elem, "sensorMinU", intrinsic.sensor_min_u, 6);
    set_attr_f64(&mut elem, "sensorMaxU", intrinsic.sensor_max_u, 6);
    set_attr_f64(&mut elem, "sensorMinV", intrinsic.sensor_min_v, 6);
    set_attr_f64(&mut elem, "sensorMaxV", intrinsic.sensor_max_v, 6);
    set_attr_f64(&mut elem, "focalLengthU", intrinsic.focal_length_u, 6);
    set_attr_f64(&mut elem, "focalLengthV", intrinsic.focal_length_v, 6);
    set_attr_f64(&mut elem, "centerPointU", intrinsic.center_point_u, 6);
    set_attr_f64(&mut elem, "centerPointV", intrinsic.center_point_v, 6);
    set_attr_f64(&mut elem, "skew", intrinsic.skew, 6);
    for (index, cell) in intrinsic.radial_distortion.iter().enumerate() {
        let name = format!("radialDistortion{}", index + 1);
        set_attr_f64(&mut elem, &name, *cell, 6);
    }
    for (index, cell) in intrinsic.tangential_distortion.iter().enumerate() {
        let name = format!("tangentalDistortion{}", index + 1);
        set_attr_f64(&mut elem, &name, *cell, 6);
    }
    elem
}

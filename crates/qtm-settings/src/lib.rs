//! Versioned settings model and XML marshalling for QTM capture systems.
//!
//! Each configuration domain (general, 3D, 6DOF, gaze, eye tracker, analog,
//! force, image, skeleton, calibration) has a reader that consumes a parsed
//! settings document and a writer that produces one. Readers return
//! `Ok(None)` when the domain's top-level section is absent, `Ok(Some(_))`
//! on success and `Err(_)` when a structurally required element is missing
//! or malformed. Which elements exist on the wire depends on the protocol
//! version, resolved through [`version::Feature`] gates.

pub mod analog;
pub mod calibration;
pub mod eye_tracker;
pub mod force;
pub mod gaze;
pub mod general;
pub mod image;
pub mod model;
pub mod sixdof;
pub mod skeleton;
pub mod threed;
pub mod value;
pub mod version;

use thiserror::Error;

/// Root element name of settings documents sent to the server.
pub const SETTINGS_ROOT: &str = "QTM_Settings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Xml(#[from] qtm_xml::XmlError),
    #[error("missing element: {0}")]
    MissingElement(String),
    #[error("missing attribute: {0}")]
    MissingAttribute(String),
    #[error("invalid value for {0}: '{1}'")]
    InvalidValue(String, String),
    #[error("{0} declares {1} entries, found {2}")]
    CountMismatch(String, usize, usize),
    #[error("duplicate segment id {0}")]
    DuplicateSegmentId(u32),
    #[error("unsupported root element: {0}")]
    UnsupportedRoot(String),
}

pub use analog::{read_analog_settings, write_analog_settings, AnalogDevice, AnalogSettings};
pub use calibration::{
    read_calibration_settings, write_calibration_settings, Calibration, CalibrationCamera,
    CalibrationType,
};
pub use eye_tracker::{read_eye_tracker_settings, write_eye_tracker_settings, EyeTracker};
pub use force::{
    read_force_settings, write_force_settings, CalibrationMatrix, ForcePlate, ForceSettings,
};
pub use gaze::{read_gaze_vector_settings, write_gaze_vector_settings, GazeVector};
pub use general::{
    read_general_settings, write_general_settings, CameraSettings, GeneralSettings,
    ProcessingActions,
};
pub use image::{read_image_settings, write_image_settings, ImageCamera, ImageFormat};
pub use model::{Point3, Position, Rotation};
pub use sixdof::{read_sixdof_settings, write_sixdof_settings, SixDofBody, SixDofSettings};
pub use skeleton::{
    read_skeleton_settings, write_skeleton_settings, Skeleton, SkeletonHierarchical,
    SkeletonSegment, SkeletonSegmentHierarchical, SkeletonSettings,
};
pub use threed::{read_3d_settings, write_3d_settings, Label3d, Settings3d};
pub use version::{Feature, ProtocolVersion};

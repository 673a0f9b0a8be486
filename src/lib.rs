//! QTM client SDK facade: versioned settings marshalling for Qualisys
//! motion-capture systems.
//!
//! [`qtm_xml`] (re-exported as [`xml`]) parses and prints the XML documents,
//! [`qtm_settings`] (re-exported as [`settings`]) maps each configuration
//! domain onto a typed model, gating wire differences on the negotiated
//! protocol version. [`Settings`] bundles one full parameters snapshot.
//!
//! ```rust
//! use qtm_rs::{ProtocolVersion, Settings};
//!
//! let xml = r#"
//!     <QTM_Parameters_Ver_1.25>
//!         <The_3D>
//!             <AxisUpwards>+Z</AxisUpwards>
//!             <CalibrationTime>2024-01-15 10:00:00</CalibrationTime>
//!             <Labels>2</Labels>
//!             <Label><Name>L_Knee</Name><RGBColor>65280</RGBColor></Label>
//!             <Label><Name>R_Knee</Name><RGBColor>255</RGBColor></Label>
//!         </The_3D>
//!     </QTM_Parameters_Ver_1.25>
//! "#;
//! let snapshot = Settings::parse(xml)?;
//! assert_eq!(snapshot.version, ProtocolVersion::new(1, 25));
//!
//! let threed = snapshot.threed.expect("3D section present");
//! assert_eq!(threed.labels.len(), 2);
//! assert_eq!(threed.labels[1].name, "R_Knee");
//! # Ok::<(), qtm_rs::SettingsError>(())
//! ```
//!
//! Domain readers stay directly usable for callers that only care about a
//! single section; see the `qtm_settings` crate docs.

pub use qtm_settings as settings;
pub use qtm_xml as xml;

pub use qtm_settings::{Feature, ProtocolVersion, SettingsError};
pub use qtm_xml::{Document, Element, XmlError};

use qtm_settings::{
    read_3d_settings, read_analog_settings, read_calibration_settings, read_eye_tracker_settings,
    read_force_settings, read_gaze_vector_settings, read_general_settings, read_image_settings,
    read_sixdof_settings, read_skeleton_settings, AnalogSettings, Calibration, EyeTracker,
    ForceSettings, GazeVector, GeneralSettings, ImageCamera, Settings3d, SixDofSettings,
    SkeletonSettings,
};
use tracing::debug;

/// One full parameters snapshot, with a slot per configuration domain.
///
/// A `None` slot means the corresponding section was absent from the
/// document, which the server uses for subsystems that are not installed.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub version: ProtocolVersion,
    pub general: Option<GeneralSettings>,
    pub threed: Option<Settings3d>,
    pub sixdof: Option<SixDofSettings>,
    pub gaze_vectors: Option<Vec<GazeVector>>,
    pub eye_trackers: Option<Vec<EyeTracker>>,
    pub analog: Option<AnalogSettings>,
    pub force: Option<ForceSettings>,
    pub image_cameras: Option<Vec<ImageCamera>>,
    pub skeletons: Option<SkeletonSettings>,
    pub calibration: Option<Calibration>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            version: ProtocolVersion::CURRENT,
            general: None,
            threed: None,
            sixdof: None,
            gaze_vectors: None,
            eye_trackers: None,
            analog: None,
            force: None,
            image_cameras: None,
            skeletons: None,
            calibration: None,
        }
    }
}

impl Settings {
    /// Read every domain of a parsed parameters document.
    ///
    /// The protocol version is taken from the root element name; a root
    /// that is not `QTM_Parameters_Ver_<major>.<minor>` is rejected.
    pub fn read(doc: &Document) -> Result<Settings, SettingsError> {
        let root = doc.root();
        let version = ProtocolVersion::from_root_name(root.name())
            .ok_or_else(|| SettingsError::UnsupportedRoot(root.name().to_string()))?;

        let snapshot = Settings {
            version,
            general: read_general_settings(root, version)?,
            threed: read_3d_settings(root)?,
            sixdof: read_sixdof_settings(root, version)?,
            gaze_vectors: read_gaze_vector_settings(root)?,
            eye_trackers: read_eye_tracker_settings(root)?,
            analog: read_analog_settings(root, version)?,
            force: read_force_settings(root, version)?,
            image_cameras: read_image_settings(root)?,
            skeletons: read_skeleton_settings(root, version)?,
            calibration: read_calibration_settings(root)?,
        };
        debug!(
            version = %snapshot.version,
            sections = snapshot.section_count(),
            "read settings snapshot"
        );
        Ok(snapshot)
    }

    /// Parse XML text and read every domain out of it.
    pub fn parse(xml: &str) -> Result<Settings, SettingsError> {
        let doc = Document::parse(xml)?;
        Settings::read(&doc)
    }

    /// Number of sections present in the snapshot.
    pub fn section_count(&self) -> usize {
        [
            self.general.is_some(),
            self.threed.is_some(),
            self.sixdof.is_some(),
            self.gaze_vectors.is_some(),
            self.eye_trackers.is_some(),
            self.analog.is_some(),
            self.force.is_some(),
            self.image_cameras.is_some(),
            self.skeletons.is_some(),
            self.calibration.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT_FIXTURE: &str = r#"
        <QTM_Parameters_Ver_1.25>
            <The_3D>
                <AxisUpwards>+Z</AxisUpwards>
                <CalibrationTime>2024-01-15 10:00:00</CalibrationTime>
                <Labels>1</Labels>
                <Label>
                    <Name>L_Knee</Name>
                    <RGBColor>65280</RGBColor>
                </Label>
            </The_3D>
            <Gaze_Vector>
                <Vector>
                    <Name>Gaze L</Name>
                    <Frequency>60.000000</Frequency>
                </Vector>
            </Gaze_Vector>
        </QTM_Parameters_Ver_1.25>
    "#;

    #[test]
    fn reads_present_sections_and_skips_absent_ones() {
        let snapshot = Settings::parse(SNAPSHOT_FIXTURE).expect("parse snapshot");
        assert_eq!(snapshot.version, ProtocolVersion::new(1, 25));
        assert_eq!(snapshot.section_count(), 2);

        let threed = snapshot.threed.as_ref().expect("3d present");
        assert_eq!(threed.labels[0].name, "L_Knee");
        let vectors = snapshot.gaze_vectors.as_ref().expect("gaze present");
        assert_eq!(vectors[0].name, "Gaze L");

        assert!(snapshot.general.is_none());
        assert!(snapshot.skeletons.is_none());
        assert!(snapshot.calibration.is_none());
    }

    #[test]
    fn unknown_root_is_rejected() {
        let err = Settings::parse("<Parameters><General/></Parameters>").expect_err("must fail");
        assert!(matches!(err, SettingsError::UnsupportedRoot(name) if name == "Parameters"));
    }

    #[test]
    fn empty_snapshot_has_no_sections() {
        let snapshot = Settings::parse("<QTM_Parameters_Ver_1.8/>").expect("parse");
        assert_eq!(snapshot.version, ProtocolVersion::new(1, 8));
        assert_eq!(snapshot.section_count(), 0);
    }
}

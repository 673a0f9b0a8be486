//! Protocol version numbers and the wire-format feature gates keyed on them.

use std::fmt;

/// Protocol version negotiated with the server, ordered by (major, minor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProtocolVersion {
    /// Newest protocol version this crate targets.
    pub const CURRENT: ProtocolVersion = ProtocolVersion::new(1, 25);

    pub const fn new(major: u32, minor: u32) -> Self {
        ProtocolVersion { major, minor }
    }

    /// Whether this version carries the given wire capability.
    pub fn supports(self, feature: Feature) -> bool {
        self >= feature.first_version()
    }

    /// Extract the version from a full-snapshot root element name such as
    /// `QTM_Parameters_Ver_1.24`.
    pub fn from_root_name(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("QTM_Parameters_Ver_")?;
        let (major, minor) = rest.split_once('.')?;
        Some(ProtocolVersion {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Wire-format capabilities that appeared at a specific protocol version.
///
/// Every version-dependent read or write decision in the domain modules goes
/// through [`ProtocolVersion::supports`] with one of these, never through an
/// inline version comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `Plate_ID` element on force plates (older documents use
    /// `Force_Plate_Index`).
    PlateIdElement,
    /// Per-channel `Channel` elements with label and unit on analog devices
    /// (older documents carry one device-level unit).
    PerChannelAnalogMeta,
    /// `GazeVector` element inside processing-action lists.
    GazeVectorAction,
    /// `ExportAviFile` element inside processing-action lists.
    AviExportAction,
    /// Per-camera `Video_Frequency` element.
    VideoFrequency,
    /// `Rows/Row/Columns/Column` calibration-matrix nesting (older documents
    /// use flat `Row1/Col1` sibling names).
    NestedCalibrationMatrix,
    /// `PreProcessing2D` element inside processing-action lists.
    PreProcessing2d,
    /// Separate realtime and reprocessing action lists next to the capture
    /// list.
    SplitProcessingActions,
    /// `Start_On_Trigger_NO/NC/Software` trigger port elements.
    TriggerPorts,
    /// Id-based 6DOF `Body` schema (older documents declare an ordinal
    /// `Bodies` count).
    SixDofIdSchema,
    /// Hierarchical skeletons with nested `Segments` trees (older documents
    /// use a flat `Parent_ID` list).
    HierarchicalSkeleton,
    /// `EulerAngles` element with the three axis-label attributes.
    EulerLabels,
    /// `External_Timestamp` element in the general section.
    ExternalTimestamp,
    /// Degree-of-freedom bounds nested in a `Constraint` element instead of
    /// attributes on the axis element.
    DofConstraintElement,
    /// Per-body `Enabled` element on 6DOF bodies (absent means enabled).
    SixDofBodyEnabled,
}

impl Feature {
    pub const ALL: [Feature; 15] = [
        Feature::PlateIdElement,
        Feature::PerChannelAnalogMeta,
        Feature::GazeVectorAction,
        Feature::AviExportAction,
        Feature::VideoFrequency,
        Feature::NestedCalibrationMatrix,
        Feature::PreProcessing2d,
        Feature::SplitProcessingActions,
        Feature::TriggerPorts,
        Feature::SixDofIdSchema,
        Feature::HierarchicalSkeleton,
        Feature::EulerLabels,
        Feature::ExternalTimestamp,
        Feature::DofConstraintElement,
        Feature::SixDofBodyEnabled,
    ];

    /// First protocol version where the capability is present on the wire.
    pub const fn first_version(self) -> ProtocolVersion {
        match self {
            Feature::PlateIdElement => ProtocolVersion::new(1, 8),
            Feature::PerChannelAnalogMeta => ProtocolVersion::new(1, 11),
            Feature::GazeVectorAction => ProtocolVersion::new(1, 12),
            Feature::AviExportAction => ProtocolVersion::new(1, 12),
            Feature::VideoFrequency => ProtocolVersion::new(1, 12),
            Feature::NestedCalibrationMatrix => ProtocolVersion::new(1, 12),
            Feature::PreProcessing2d => ProtocolVersion::new(1, 14),
            Feature::SplitProcessingActions => ProtocolVersion::new(1, 14),
            Feature::TriggerPorts => ProtocolVersion::new(1, 15),
            Feature::SixDofIdSchema => ProtocolVersion::new(1, 21),
            Feature::HierarchicalSkeleton => ProtocolVersion::new(1, 21),
            Feature::EulerLabels => ProtocolVersion::new(1, 21),
            Feature::ExternalTimestamp => ProtocolVersion::new(1, 22),
            Feature::DofConstraintElement => ProtocolVersion::new(1, 22),
            Feature::SixDofBodyEnabled => ProtocolVersion::new(1, 24),
        }
    }
}

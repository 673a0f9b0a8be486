//! General capture settings: timing, triggers, timebase, processing
//! pipelines and the camera list.

use bitflags::bitflags;
use qtm_xml::{Document, Element};
use tracing::{debug, warn};

use crate::model::Point3;
use crate::value::{
    attr_f32_or_nan, optional_bool, push_bool, push_f32, push_i32, push_str, push_u32,
    required_bool, required_child, required_parsed, required_text, set_attr_f32,
};
use crate::version::{Feature, ProtocolVersion};
use crate::{SettingsError, SETTINGS_ROOT};

bitflags! {
    /// Processing pipeline steps toggled for a capture pass.
    ///
    /// `TRACKING_2D` and `TRACKING_3D` are mutually exclusive on the wire:
    /// the `Tracking` element carries `2D`, `3D` or `False`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProcessingActions: u32 {
        const PRE_PROCESS_2D    = 1 << 0;
        const TRACKING_2D       = 1 << 1;
        const TRACKING_3D       = 1 << 2;
        const TWIN_SYSTEM_MERGE = 1 << 3;
        const SPLINE_FILL       = 1 << 4;
        const AIM               = 1 << 5;
        const TRACK_6DOF        = 1 << 6;
        const FORCE_DATA        = 1 << 7;
        const GAZE_VECTOR       = 1 << 8;
        const EXPORT_TSV        = 1 << 9;
        const EXPORT_C3D        = 1 << 10;
        const EXPORT_MATLAB     = 1 << 11;
        const EXPORT_AVI        = 1 << 12;
    }
}

/// Source feeding the external time base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalSource {
    #[default]
    ControlPort,
    IrReceiver,
    Smpte,
    Irig,
    VideoSync,
}

impl SignalSource {
    pub const ALL: [SignalSource; 5] = [
        SignalSource::ControlPort,
        SignalSource::IrReceiver,
        SignalSource::Smpte,
        SignalSource::Irig,
        SignalSource::VideoSync,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            SignalSource::ControlPort => "Control port",
            SignalSource::IrReceiver => "IR receiver",
            SignalSource::Smpte => "SMPTE",
            SignalSource::Irig => "IRIG",
            SignalSource::VideoSync => "Video sync",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|source| source.wire_name().eq_ignore_ascii_case(text))
    }
}

/// External timestamp source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampKind {
    #[default]
    Smpte,
    Irig,
    CameraTime,
}

impl TimestampKind {
    pub const ALL: [TimestampKind; 3] =
        [TimestampKind::Smpte, TimestampKind::Irig, TimestampKind::CameraTime];

    pub const fn wire_name(self) -> &'static str {
        match self {
            TimestampKind::Smpte => "SMPTE",
            TimestampKind::Irig => "IRIG",
            TimestampKind::CameraTime => "CameraTime",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.wire_name().eq_ignore_ascii_case(text))
    }
}

/// External time base configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalTimebase {
    pub enabled: bool,
    pub signal_source: SignalSource,
    /// Periodic vs non-periodic signal mode.
    pub signal_mode_periodic: bool,
    pub frequency_multiplier: u32,
    pub frequency_divisor: u32,
    pub frequency_tolerance: u32,
    /// NaN encodes the wire literal `None`.
    pub nominal_frequency: f32,
    pub negative_edge: bool,
    pub signal_shutter_delay: u32,
    pub non_periodic_timeout: f32,
}

impl Default for ExternalTimebase {
    fn default() -> Self {
        ExternalTimebase {
            enabled: false,
            signal_source: SignalSource::ControlPort,
            signal_mode_periodic: true,
            frequency_multiplier: 1,
            frequency_divisor: 1,
            frequency_tolerance: 0,
            nominal_frequency: f32::NAN,
            negative_edge: false,
            signal_shutter_delay: 0,
            non_periodic_timeout: f32::NAN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExternalTimestamp {
    pub enabled: bool,
    pub kind: TimestampKind,
    pub frequency: u32,
}

/// Euler angle axis labels reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EulerLabels {
    pub first: String,
    pub second: String,
    pub third: String,
}

/// Known camera hardware models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModel {
    MacReflex,
    ProReflex120,
    ProReflex240,
    ProReflex500,
    ProReflex1000,
    Oqus100,
    Oqus200C,
    Oqus300,
    Oqus300Plus,
    Oqus400,
    Oqus500,
    Oqus500Plus,
    Oqus600Plus,
    Oqus700,
    Oqus700Plus,
    MiqusM1,
    MiqusM3,
    MiqusM5,
    MiqusSyncUnit,
    MiqusVideo,
    MiqusVideoColor,
    MiqusHybrid,
    MiqusVideoColorPlus,
    ArqusA5,
    ArqusA9,
    ArqusA12,
    ArqusA26,
}

impl CameraModel {
    pub const ALL: [CameraModel; 27] = [
        CameraModel::MacReflex,
        CameraModel::ProReflex120,
        CameraModel::ProReflex240,
        CameraModel::ProReflex500,
        CameraModel::ProReflex1000,
        CameraModel::Oqus100,
        CameraModel::Oqus200C,
        CameraModel::Oqus300,
        CameraModel::Oqus300Plus,
        CameraModel::Oqus400,
        CameraModel::Oqus500,
        CameraModel::Oqus500Plus,
        CameraModel::Oqus600Plus,
        CameraModel::Oqus700,
        CameraModel::Oqus700Plus,
        CameraModel::MiqusM1,
        CameraModel::MiqusM3,
        CameraModel::MiqusM5,
        CameraModel::MiqusSyncUnit,
        CameraModel::MiqusVideo,
        CameraModel::MiqusVideoColor,
        CameraModel::MiqusHybrid,
        CameraModel::MiqusVideoColorPlus,
        CameraModel::ArqusA5,
        CameraModel::ArqusA9,
        CameraModel::ArqusA12,
        CameraModel::ArqusA26,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            CameraModel::MacReflex => "MacReflex",
            CameraModel::ProReflex120 => "ProReflex 120",
            CameraModel::ProReflex240 => "ProReflex 240",
            CameraModel::ProReflex500 => "ProReflex 500",
            CameraModel::ProReflex1000 => "ProReflex 1000",
            CameraModel::Oqus100 => "Oqus 100",
            CameraModel::Oqus200C => "Oqus 200 C",
            CameraModel::Oqus300 => "Oqus 300",
            CameraModel::Oqus300Plus => "Oqus 300 Plus",
            CameraModel::Oqus400 => "Oqus 400",
            CameraModel::Oqus500 => "Oqus 500",
            CameraModel::Oqus500Plus => "Oqus 500 Plus",
            CameraModel::Oqus600Plus => "Oqus 600 Plus",
            CameraModel::Oqus700 => "Oqus 700",
            CameraModel::Oqus700Plus => "Oqus 700 Plus",
            CameraModel::MiqusM1 => "Miqus M1",
            CameraModel::MiqusM3 => "Miqus M3",
            CameraModel::MiqusM5 => "Miqus M5",
            CameraModel::MiqusSyncUnit => "Miqus Sync Unit",
            CameraModel::MiqusVideo => "Miqus Video",
            CameraModel::MiqusVideoColor => "Miqus Video Color",
            CameraModel::MiqusHybrid => "Miqus Hybrid",
            CameraModel::MiqusVideoColorPlus => "Miqus Video Color Plus",
            CameraModel::ArqusA5 => "Arqus A5",
            CameraModel::ArqusA9 => "Arqus A9",
            CameraModel::ArqusA12 => "Arqus A12",
            CameraModel::ArqusA26 => "Arqus A26",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|model| model.wire_name().eq_ignore_ascii_case(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Marker,
    MarkerIntensity,
    Video,
}

impl CameraMode {
    pub const ALL: [CameraMode; 3] =
        [CameraMode::Marker, CameraMode::MarkerIntensity, CameraMode::Video];

    pub const fn wire_name(self) -> &'static str {
        match self {
            CameraMode::Marker => "Marker",
            CameraMode::MarkerIntensity => "Marker Intensity",
            CameraMode::Video => "Video",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.wire_name().eq_ignore_ascii_case(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResolution {
    P1440,
    P1080,
    P720,
    P540,
    P480,
}

impl VideoResolution {
    pub const ALL: [VideoResolution; 5] = [
        VideoResolution::P1440,
        VideoResolution::P1080,
        VideoResolution::P720,
        VideoResolution::P540,
        VideoResolution::P480,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            VideoResolution::P1440 => "1440p",
            VideoResolution::P1080 => "1080p",
            VideoResolution::P720 => "720p",
            VideoResolution::P540 => "540p",
            VideoResolution::P480 => "480p",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|res| res.wire_name().eq_ignore_ascii_case(text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAspectRatio {
    SixteenByNine,
    FourByThree,
    OneByOne,
}

impl VideoAspectRatio {
    pub const ALL: [VideoAspectRatio; 3] = [
        VideoAspectRatio::SixteenByNine,
        VideoAspectRatio::FourByThree,
        VideoAspectRatio::OneByOne,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            VideoAspectRatio::SixteenByNine => "16x9",
            VideoAspectRatio::FourByThree => "4x3",
            VideoAspectRatio::OneByOne => "1x1",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.wire_name().eq_ignore_ascii_case(text))
    }
}

/// Sync output signal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutMode {
    ShutterOut,
    Multiplier,
    Divisor,
    IndependentFreq,
    MeasurementTime,
    FixedOneHundredHz,
    SystemLiveTime,
}

impl SyncOutMode {
    pub const ALL: [SyncOutMode; 7] = [
        SyncOutMode::ShutterOut,
        SyncOutMode::Multiplier,
        SyncOutMode::Divisor,
        SyncOutMode::IndependentFreq,
        SyncOutMode::MeasurementTime,
        SyncOutMode::FixedOneHundredHz,
        SyncOutMode::SystemLiveTime,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            SyncOutMode::ShutterOut => "Shutter out",
            SyncOutMode::Multiplier => "Multiplier",
            SyncOutMode::Divisor => "Divisor",
            SyncOutMode::IndependentFreq => "Camera independent",
            SyncOutMode::MeasurementTime => "Measurement time",
            SyncOutMode::FixedOneHundredHz => "Continuous 100Hz",
            SyncOutMode::SystemLiveTime => "System live time",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|mode| mode.wire_name().eq_ignore_ascii_case(text))
    }

    /// Modes that carry a `Value` and `Duty_Cycle` pair.
    pub const fn has_frequency_fields(self) -> bool {
        matches!(
            self,
            SyncOutMode::Multiplier | SyncOutMode::Divisor | SyncOutMode::IndependentFreq
        )
    }

    /// Modes that carry a `Signal_Polarity` element.
    pub const fn has_polarity(self) -> bool {
        !matches!(self, SyncOutMode::FixedOneHundredHz | SyncOutMode::SystemLiveTime)
    }
}

/// A current value with its valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RangedValue {
    pub current: u32,
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FovRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

/// Camera pose: position plus a row-major 3x3 rotation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPosition {
    pub point: Point3,
    pub rotation: [[f32; 3]; 3],
}

impl Default for CameraPosition {
    fn default() -> Self {
        CameraPosition {
            point: Point3::default(),
            rotation: [[f32::NAN; 3]; 3],
        }
    }
}

/// One sync output port configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOut {
    pub mode: SyncOutMode,
    /// Multiplier/divisor/independent frequency value; unused otherwise.
    pub value: u32,
    pub duty_cycle: f32,
    pub negative_polarity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LensRange {
    pub value: f32,
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LensControl {
    pub focus: LensRange,
    pub aperture: LensRange,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoExposure {
    pub enabled: bool,
    pub compensation: f32,
}

/// Per-camera settings as reported in the general section.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraSettings {
    pub id: u32,
    pub model: CameraModel,
    pub underwater: Option<bool>,
    pub supports_hw_sync: Option<bool>,
    pub serial: u32,
    pub mode: CameraMode,
    pub video_frequency: Option<u32>,
    pub video_resolution: Option<VideoResolution>,
    pub video_aspect_ratio: Option<VideoAspectRatio>,
    pub video_exposure: RangedValue,
    pub video_flash_time: RangedValue,
    pub marker_exposure: RangedValue,
    pub marker_threshold: RangedValue,
    pub position: CameraPosition,
    pub orientation: i32,
    pub marker_resolution: Resolution,
    pub video_resolution_px: Resolution,
    pub marker_fov: FovRect,
    pub video_fov: FovRect,
    /// Ports in wire order: `Sync_Out`, `Sync_Out2`, `Sync_Out_MT`.
    pub sync_out: [Option<SyncOut>; 3],
    pub lens_control: Option<LensControl>,
    pub auto_exposure: Option<AutoExposure>,
    pub auto_white_balance: Option<bool>,
}

/// The `General` settings section.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralSettings {
    pub capture_frequency: u32,
    /// Capture duration in seconds.
    pub capture_time: f32,
    pub start_on_external_trigger: bool,
    pub trigger_no: Option<bool>,
    pub trigger_nc: Option<bool>,
    pub trigger_software: Option<bool>,
    pub external_timebase: ExternalTimebase,
    pub external_timestamp: Option<ExternalTimestamp>,
    pub processing: ProcessingActions,
    pub realtime_processing: Option<ProcessingActions>,
    pub reprocessing: Option<ProcessingActions>,
    pub euler: Option<EulerLabels>,
    pub cameras: Vec<CameraSettings>,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        GeneralSettings {
            capture_frequency: 0,
            capture_time: f32::NAN,
            start_on_external_trigger: false,
            trigger_no: None,
            trigger_nc: None,
            trigger_software: None,
            external_timebase: ExternalTimebase::default(),
            external_timestamp: None,
            processing: ProcessingActions::empty(),
            realtime_processing: None,
            reprocessing: None,
            euler: None,
            cameras: Vec::new(),
        }
    }
}

const SYNC_OUT_ELEMENTS: [&str; 3] = ["Sync_Out", "Sync_Out2", "Sync_Out_MT"];

/// Read the `General` section, or `Ok(None)` when it is absent.
pub fn read_general_settings(
    root: &Element,
    version: ProtocolVersion,
) -> Result<Option<GeneralSettings>, SettingsError> {
    let Some(general) = root.child("General") else {
        return Ok(None);
    };

    let mut settings = GeneralSettings {
        capture_frequency: required_parsed(general, "Frequency")?,
        capture_time: required_parsed(general, "Capture_Time")?,
        start_on_external_trigger: required_bool(general, "Start_On_External_Trigger")?,
        ..GeneralSettings::default()
    };

    if version.supports(Feature::TriggerPorts) {
        settings.trigger_no = Some(required_bool(general, "Start_On_Trigger_NO")?);
        settings.trigger_nc = Some(required_bool(general, "Start_On_Trigger_NC")?);
        settings.trigger_software = Some(required_bool(general, "Start_On_Trigger_Software")?);
    }

    settings.external_timebase = read_timebase(required_child(general, "External_Time_Base")?)?;
    if version.supports(Feature::ExternalTimestamp) {
        settings.external_timestamp = general
            .child("External_Timestamp")
            .map(read_timestamp)
            .transpose()?;
    }

    settings.processing =
        read_processing_actions(required_child(general, "Processing_Actions")?, version, false)?;
    if version.supports(Feature::SplitProcessingActions) {
        settings.realtime_processing = Some(read_processing_actions(
            required_child(general, "RealTime_Processing_Actions")?,
            version,
            true,
        )?);
        settings.reprocessing = Some(read_processing_actions(
            required_child(general, "Reprocessing_Actions")?,
            version,
            false,
        )?);
    }

    if version.supports(Feature::EulerLabels) {
        settings.euler = general.child("EulerAngles").map(|elem| EulerLabels {
            first: elem.attribute("First").unwrap_or_default().to_string(),
            second: elem.attribute("Second").unwrap_or_default().to_string(),
            third: elem.attribute("Third").unwrap_or_default().to_string(),
        });
    }

    for camera_elem in general.children("Camera") {
        match read_camera(camera_elem, version) {
            Ok(camera) => settings.cameras.push(camera),
            Err(err) => warn!(error = %err, "skipping unreadable camera element"),
        }
    }

    debug!(
        frequency = settings.capture_frequency,
        cameras = settings.cameras.len(),
        "read general settings"
    );
    Ok(Some(settings))
}

fn read_timebase(elem: &Element) -> Result<ExternalTimebase, SettingsError> {
    let source_text = required_text(elem, "Signal_Source")?;
    let signal_source = SignalSource::from_wire(source_text).ok_or_else(|| {
        SettingsError::InvalidValue("Signal_Source".into(), source_text.into())
    })?;
    let mode_text = required_text(elem, "Signal_Mode")?;
    let signal_mode_periodic = mode_text.trim().eq_ignore_ascii_case("periodic");

    let nominal_text = required_text(elem, "Nominal_Frequency")?;
    let nominal_frequency = if nominal_text.trim().eq_ignore_ascii_case("none") {
        f32::NAN
    } else {
        nominal_text.trim().parse().map_err(|_| {
            SettingsError::InvalidValue("Nominal_Frequency".into(), nominal_text.into())
        })?
    };

    let edge_text = required_text(elem, "Signal_Edge")?;

    Ok(ExternalTimebase {
        enabled: required_bool(elem, "Enabled")?,
        signal_source,
        signal_mode_periodic,
        frequency_multiplier: required_parsed(elem, "Frequency_Multiplier")?,
        frequency_divisor: required_parsed(elem, "Frequency_Divisor")?,
        frequency_tolerance: required_parsed(elem, "Frequency_Tolerance")?,
        nominal_frequency,
        negative_edge: edge_text.trim().eq_ignore_ascii_case("negative"),
        signal_shutter_delay: required_parsed(elem, "Signal_Shutter_Delay")?,
        non_periodic_timeout: required_parsed(elem, "Non_Periodic_Timeout")?,
    })
}

fn read_timestamp(elem: &Element) -> Result<ExternalTimestamp, SettingsError> {
    let kind_text = required_text(elem, "Type")?;
    let kind = TimestampKind::from_wire(kind_text)
        .ok_or_else(|| SettingsError::InvalidValue("Type".into(), kind_text.into()))?;
    Ok(ExternalTimestamp {
        enabled: required_bool(elem, "Enabled")?,
        kind,
        frequency: required_parsed(elem, "Frequency")?,
    })
}

fn read_processing_actions(
    elem: &Element,
    version: ProtocolVersion,
    realtime: bool,
) -> Result<ProcessingActions, SettingsError> {
    let mut actions = ProcessingActions::empty();

    if version.supports(Feature::PreProcessing2d) && required_bool(elem, "PreProcessing2D")? {
        actions |= ProcessingActions::PRE_PROCESS_2D;
    }
    if let Some(tracking) = elem.child_text("Tracking") {
        let tracking = tracking.trim();
        if tracking.eq_ignore_ascii_case("2d") {
            actions |= ProcessingActions::TRACKING_2D;
        } else if tracking.eq_ignore_ascii_case("3d") {
            actions |= ProcessingActions::TRACKING_3D;
        }
    }
    if !realtime {
        if required_bool(elem, "TwinSystemMerge")? {
            actions |= ProcessingActions::TWIN_SYSTEM_MERGE;
        }
        if required_bool(elem, "SplineFill")? {
            actions |= ProcessingActions::SPLINE_FILL;
        }
    }
    if required_bool(elem, "AIM")? {
        actions |= ProcessingActions::AIM;
    }
    if required_bool(elem, "Track6DOF")? {
        actions |= ProcessingActions::TRACK_6DOF;
    }
    if required_bool(elem, "ForceData")? {
        actions |= ProcessingActions::FORCE_DATA;
    }
    if version.supports(Feature::GazeVectorAction) && required_bool(elem, "GazeVector")? {
        actions |= ProcessingActions::GAZE_VECTOR;
    }
    if !realtime {
        if required_bool(elem, "ExportTSV")? {
            actions |= ProcessingActions::EXPORT_TSV;
        }
        if required_bool(elem, "ExportC3D")? {
            actions |= ProcessingActions::EXPORT_C3D;
        }
        if required_bool(elem, "ExportMatlabFile")? {
            actions |= ProcessingActions::EXPORT_MATLAB;
        }
        if version.supports(Feature::AviExportAction) && required_bool(elem, "ExportAviFile")? {
            actions |= ProcessingActions::EXPORT_AVI;
        }
    }
    Ok(actions)
}

fn read_camera(elem: &Element, version: ProtocolVersion) -> Result<CameraSettings, SettingsError> {
    let model_text = required_text(elem, "Model")?;
    let model = CameraModel::from_wire(model_text)
        .ok_or_else(|| SettingsError::InvalidValue("Model".into(), model_text.into()))?;
    let mode_text = required_text(elem, "Mode")?;
    let mode = CameraMode::from_wire(mode_text)
        .ok_or_else(|| SettingsError::InvalidValue("Mode".into(), mode_text.into()))?;

    let video_frequency = if version.supports(Feature::VideoFrequency) {
        Some(required_parsed(elem, "Video_Frequency")?)
    } else {
        None
    };

    let video_resolution = match elem.child_text("Video_Resolution") {
        Some(text) => Some(VideoResolution::from_wire(text).ok_or_else(|| {
            SettingsError::InvalidValue("Video_Resolution".into(), text.into())
        })?),
        None => None,
    };
    let video_aspect_ratio = match elem.child_text("Video_Aspect_Ratio") {
        Some(text) => Some(VideoAspectRatio::from_wire(text).ok_or_else(|| {
            SettingsError::InvalidValue("Video_Aspect_Ratio".into(), text.into())
        })?),
        None => None,
    };

    let mut sync_out = [None, None, None];
    for (slot, name) in sync_out.iter_mut().zip(SYNC_OUT_ELEMENTS) {
        *slot = read_sync_out(elem, name)?;
    }

    Ok(CameraSettings {
        id: required_parsed(elem, "ID")?,
        model,
        underwater: optional_bool(elem, "Underwater")?,
        supports_hw_sync: optional_bool(elem, "Supports_HW_Sync")?,
        serial: required_parsed(elem, "Serial")?,
        mode,
        video_frequency,
        video_resolution,
        video_aspect_ratio,
        video_exposure: read_ranged(elem, "Video_Exposure")?,
        video_flash_time: read_ranged(elem, "Video_Flash_Time")?,
        marker_exposure: read_ranged(elem, "Marker_Exposure")?,
        marker_threshold: read_ranged(elem, "Marker_Threshold")?,
        position: read_camera_position(required_child(elem, "Position")?),
        orientation: required_parsed(elem, "Orientation")?,
        marker_resolution: read_resolution(elem, "Marker_Res")?,
        video_resolution_px: read_resolution(elem, "Video_Res")?,
        marker_fov: read_fov(elem, "Marker_FOV")?,
        video_fov: read_fov(elem, "Video_FOV")?,
        sync_out,
        lens_control: read_lens_control(elem),
        auto_exposure: read_auto_exposure(elem),
        auto_white_balance: optional_bool(elem, "AutoWhiteBalance")?,
    })
}

fn read_ranged(parent: &Element, name: &str) -> Result<RangedValue, SettingsError> {
    let elem = required_child(parent, name)?;
    Ok(RangedValue {
        current: required_parsed(elem, "Current")?,
        min: required_parsed(elem, "Min")?,
        max: required_parsed(elem, "Max")?,
    })
}

fn read_resolution(parent: &Element, name: &str) -> Result<Resolution, SettingsError> {
    let elem = required_child(parent, name)?;
    Ok(Resolution {
        width: required_parsed(elem, "Width")?,
        height: required_parsed(elem, "Height")?,
    })
}

fn read_fov(parent: &Element, name: &str) -> Result<FovRect, SettingsError> {
    let elem = required_child(parent, name)?;
    Ok(FovRect {
        left: required_parsed(elem, "Left")?,
        top: required_parsed(elem, "Top")?,
        right: required_parsed(elem, "Right")?,
        bottom: required_parsed(elem, "Bottom")?,
    })
}

fn read_camera_position(elem: &Element) -> CameraPosition {
    let point = Point3::new(
        attr_f32_or_nan(elem, "X"),
        attr_f32_or_nan(elem, "Y"),
        attr_f32_or_nan(elem, "Z"),
    );
    let mut rotation = [[f32::NAN; 3]; 3];
    for (row, cells) in rotation.iter_mut().enumerate() {
        for (col, cell) in cells.iter_mut().enumerate() {
            let name = format!("Rot_{}_{}", row + 1, col + 1);
            *cell = attr_f32_or_nan(elem, &name);
        }
    }
    CameraPosition { point, rotation }
}

fn read_sync_out(camera: &Element, name: &str) -> Result<Option<SyncOut>, SettingsError> {
    let Some(elem) = camera.child(name) else {
        return Ok(None);
    };
    let mode_text = required_text(elem, "Mode")?;
    let mode = SyncOutMode::from_wire(mode_text)
        .ok_or_else(|| SettingsError::InvalidValue("Mode".into(), mode_text.into()))?;

    let mut out = SyncOut {
        mode,
        value: 0,
        duty_cycle: 0.0,
        negative_polarity: false,
    };
    if mode.has_frequency_fields() {
        out.value = required_parsed(elem, "Value")?;
        out.duty_cycle = required_parsed(elem, "Duty_Cycle")?;
    }
    if mode.has_polarity() {
        out.negative_polarity = elem
            .child_text("Signal_Polarity")
            .map(|text| text.trim().eq_ignore_ascii_case("negative"))
            .unwrap_or(false);
    }
    Ok(Some(out))
}

fn read_lens_control(camera: &Element) -> Option<LensControl> {
    let elem = camera.child("LensControl")?;
    let focus = elem.child("Focus")?;
    let aperture = elem.child("Aperture")?;
    Some(LensControl {
        focus: read_lens_range(focus),
        aperture: read_lens_range(aperture),
    })
}

fn read_lens_range(elem: &Element) -> LensRange {
    LensRange {
        value: attr_f32_or_nan(elem, "Value"),
        min: attr_f32_or_nan(elem, "Min"),
        max: attr_f32_or_nan(elem, "Max"),
    }
}

fn read_auto_exposure(camera: &Element) -> Option<AutoExposure> {
    let elem = camera.child("AutoExposure")?;
    let enabled = elem
        .attribute("Enabled")
        .map(|text| text.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    Some(AutoExposure {
        enabled,
        compensation: attr_f32_or_nan(elem, "Compensation"),
    })
}

/// Build a settings document carrying the `General` section.
pub fn write_general_settings(settings: &GeneralSettings, version: ProtocolVersion) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let general = root.push(Element::new("General"));

    push_u32(general, "Frequency", settings.capture_frequency);
    push_f32(general, "Capture_Time", settings.capture_time, 3);
    push_bool(
        general,
        "Start_On_External_Trigger",
        settings.start_on_external_trigger,
    );
    if version.supports(Feature::TriggerPorts) {
        if let Some(value) = settings.trigger_no {
            push_bool(general, "Start_On_Trigger_NO", value);
        }
        if let Some(value) = settings.trigger_nc {
            push_bool(general, "Start_On_Trigger_NC", value);
        }
        if let Some(value) = settings.trigger_software {
            push_bool(general, "Start_On_Trigger_Software", value);
        }
    }

    write_timebase(general, &settings.external_timebase);
    if version.supports(Feature::ExternalTimestamp) {
        if let Some(timestamp) = &settings.external_timestamp {
            write_timestamp(general, timestamp);
        }
    }

    write_processing_actions(general, "Processing_Actions", settings.processing, version, false);
    if version.supports(Feature::SplitProcessingActions) {
        if let Some(actions) = settings.realtime_processing {
            write_processing_actions(
                general,
                "RealTime_Processing_Actions",
                actions,
                version,
                true,
            );
        }
        if let Some(actions) = settings.reprocessing {
            write_processing_actions(general, "Reprocessing_Actions", actions, version, false);
        }
    }

    if version.supports(Feature::EulerLabels) {
        if let Some(euler) = &settings.euler {
            general.push(
                Element::new("EulerAngles")
                    .with_attribute("First", euler.first.as_str())
                    .with_attribute("Second", euler.second.as_str())
                    .with_attribute("Third", euler.third.as_str()),
            );
        }
    }

    for camera in &settings.cameras {
        write_camera(general, camera, version);
    }

    Document::new(root)
}

fn write_timebase(parent: &mut Element, timebase: &ExternalTimebase) {
    let elem = parent.push(Element::new("External_Time_Base"));
    push_bool(elem, "Enabled", timebase.enabled);
    push_str(elem, "Signal_Source", timebase.signal_source.wire_name());
    push_str(
        elem,
        "Signal_Mode",
        if timebase.signal_mode_periodic {
            "Periodic"
        } else {
            "Non-periodic"
        },
    );
    push_u32(elem, "Frequency_Multiplier", timebase.frequency_multiplier);
    push_u32(elem, "Frequency_Divisor", timebase.frequency_divisor);
    push_u32(elem, "Frequency_Tolerance", timebase.frequency_tolerance);
    if timebase.nominal_frequency.is_nan() {
        push_str(elem, "Nominal_Frequency", "None");
    } else {
        push_f32(elem, "Nominal_Frequency", timebase.nominal_frequency, 3);
    }
    push_str(
        elem,
        "Signal_Edge",
        if timebase.negative_edge { "Negative" } else { "Positive" },
    );
    push_u32(elem, "Signal_Shutter_Delay", timebase.signal_shutter_delay);
    push_f32(elem, "Non_Periodic_Timeout", timebase.non_periodic_timeout, 3);
}

fn write_timestamp(parent: &mut Element, timestamp: &ExternalTimestamp) {
    let elem = parent.push(Element::new("External_Timestamp"));
    push_bool(elem, "Enabled", timestamp.enabled);
    push_str(elem, "Type", timestamp.kind.wire_name());
    push_u32(elem, "Frequency", timestamp.frequency);
}

fn write_processing_actions(
    parent: &mut Element,
    name: &str,
    actions: ProcessingActions,
    version: ProtocolVersion,
    realtime: bool,
) {
    let elem = parent.push(Element::new(name));
    if version.supports(Feature::PreProcessing2d) {
        push_bool(
            elem,
            "PreProcessing2D",
            actions.contains(ProcessingActions::PRE_PROCESS_2D),
        );
    }
    let tracking = if actions.contains(ProcessingActions::TRACKING_2D) {
        "2D"
    } else if actions.contains(ProcessingActions::TRACKING_3D) {
        "3D"
    } else {
        "False"
    };
    push_str(elem, "Tracking", tracking);
    if !realtime {
        push_bool(
            elem,
            "TwinSystemMerge",
            actions.contains(ProcessingActions::TWIN_SYSTEM_MERGE),
        );
        push_bool(elem, "SplineFill", actions.contains(ProcessingActions::SPLINE_FILL));
    }
    push_bool(elem, "AIM", actions.contains(ProcessingActions::AIM));
    push_bool(elem, "Track6DOF", actions.contains(ProcessingActions::TRACK_6DOF));
    push_bool(elem, "ForceData", actions.contains(ProcessingActions::FORCE_DATA));
    if version.supports(Feature::GazeVectorAction) {
        push_bool(elem, "GazeVector", actions.contains(ProcessingActions::GAZE_VECTOR));
    }
    if !realtime {
        push_bool(elem, "ExportTSV", actions.contains(ProcessingActions::EXPORT_TSV));
        push_bool(elem, "ExportC3D", actions.contains(ProcessingActions::EXPORT_C3D));
        push_bool(
            elem,
            "ExportMatlabFile",
            actions.contains(ProcessingActions::EXPORT_MATLAB),
        );
        if version.supports(Feature::AviExportAction) {
            push_bool(elem, "ExportAviFile", actions.contains(ProcessingActions::EXPORT_AVI));
        }
    }
}

fn write_camera(parent: &mut Element, camera: &CameraSettings, version: ProtocolVersion) {
    let elem = parent.push(Element::new("Camera"));
    push_u32(elem, "ID", camera.id);
    push_str(elem, "Model", camera.model.wire_name());
    if let Some(value) = camera.underwater {
        push_bool(elem, "Underwater", value);
    }
    if let Some(value) = camera.supports_hw_sync {
        push_bool(elem, "Supports_HW_Sync", value);
    }
    push_u32(elem, "Serial", camera.serial);
    push_str(elem, "Mode", camera.mode.wire_name());
    if version.supports(Feature::VideoFrequency) {
        if let Some(frequency) = camera.video_frequency {
            push_u32(elem, "Video_Frequency", frequency);
        }
    }
    if let Some(resolution) = camera.video_resolution {
        push_str(elem, "Video_Resolution", resolution.wire_name());
    }
    if let Some(ratio) = camera.video_aspect_ratio {
        push_str(elem, "Video_Aspect_Ratio", ratio.wire_name());
    }
    push_ranged(elem, "Video_Exposure", &camera.video_exposure);
    push_ranged(elem, "Video_Flash_Time", &camera.video_flash_time);
    push_ranged(elem, "Marker_Exposure", &camera.marker_exposure);
    push_ranged(elem, "Marker_Threshold", &camera.marker_threshold);

    let position = elem.push(Element::new("Position"));
    set_attr_f32(position, "X", camera.position.point.x, 6);
    set_attr_f32(position, "Y", camera.position.point.y, 6);
    set_attr_f32(position, "Z", camera.position.point.z, 6);
    for (row, cells) in camera.position.rotation.iter().enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            let name = format!("Rot_{}_{}", row + 1, col + 1);
            set_attr_f32(position, &name, *cell, 6);
        }
    }

    push_i32(elem, "Orientation", camera.orientation);
    push_resolution(elem, "Marker_Res", &camera.marker_resolution);
    push_resolution(elem, "Video_Res", &camera.video_resolution_px);
    push_fov(elem, "Marker_FOV", &camera.marker_fov);
    push_fov(elem, "Video_FOV", &camera.video_fov);

    for (slot, name) in camera.sync_out.iter().zip(SYNC_OUT_ELEMENTS) {
        if let Some(sync) = slot {
            write_sync_out(elem, name, sync);
        }
    }

    if let Some(lens) = &camera.lens_control {
        let lens_elem = elem.push(Element::new("LensControl"));
        write_lens_range(lens_elem, "Focus", &lens.focus);
        write_lens_range(lens_elem, "Aperture", &lens.aperture);
    }
    if let Some(auto) = &camera.auto_exposure {
        let mut auto_elem = Element::new("AutoExposure");
        auto_elem.set_attribute("Enabled", if auto.enabled { "true" } else { "false" });
        set_attr_f32(&mut auto_elem, "Compensation", auto.compensation, 6);
        elem.push(auto_elem);
    }
    if let Some(value) = camera.auto_white_balance {
        push_bool(elem, "AutoWhiteBalance", value);
    }
}

fn push_ranged(parent: &mut Element, name: &str, value: &RangedValue) {
    let elem = parent.push(Element::new(name));
    push_u32(elem, "Current", value.current);
    push_u32(elem, "Min", value.min);
    push_u32(elem, "Max", value.max);
}

fn push_resolution(parent: &mut Element, name: &str, value: &Resolution) {
    let elem = parent.push(Element::new(name));
    push_u32(elem, "Width", value.width);
    push_u32(elem, "Height", value.height);
}

fn push_fov(parent: &mut Element, name: &str, value: &FovRect) {
    let elem = parent.push(Element::new(name));
    push_u32(elem, "Left", value.left);
    push_u32(elem, "Top", value.top);
    push_u32(elem, "Right", value.right);
    push_u32(elem, "Bottom", value.bottom);
}

fn write_sync_out(parent: &mut Element, name: &str, sync: &SyncOut) {
    let elem = parent.push(Element::new(name));
    push_str(elem, "Mode", sync.mode.wire_name());
    if sync.mode.has_frequency_fields() {
        push_u32(elem, "Value", sync.value);
        push_f32(elem, "Duty_Cycle", sync.duty_cycle, 3);
    }
    if sync.mode.has_polarity() {
        push_str(
            elem,
            "Signal_Polarity",
            if sync.negative_polarity { "Negative" } else { "Positive" },
        );
    }
}

fn write_lens_range(parent: &mut Element, name: &str, range: &LensRange) {
    let mut elem = Element::new(name);
    set_attr_f32(&mut elem, "Value", range.value, 6);
    set_attr_f32(&mut elem, "Min", range.min, 6);
    set_attr_f32(&mut elem, "Max", range.max, 6);
    parent.push(elem);
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtm_xml::Document;

    const V1_25: ProtocolVersion = ProtocolVersion::new(1, 25);

    const GENERAL_FIXTURE: &str = r#"
        <QTM_Parameters_Ver_1.25>
            <General>
                <Frequency>100</Frequency>
                <Capture_Time>10.000</Capture_Time>
                <Start_On_External_Trigger>False</Start_On_External_Trigger>
                <Start_On_Trigger_NO>True</Start_On_Trigger_NO>
                <Start_On_Trigger_NC>False</Start_On_Trigger_NC>
                <Start_On_Trigger_Software>False</Start_On_Trigger_Software>
                <External_Time_Base>
                    <Enabled>True</Enabled>
                    <Signal_Source>IR receiver</Signal_Source>
                    <Signal_Mode>Periodic</Signal_Mode>
                    <Frequency_Multiplier>2</Frequency_Multiplier>
                    <Frequency_Divisor>1</Frequency_Divisor>
                    <Frequency_Tolerance>1000</Frequency_Tolerance>
                    <Nominal_Frequency>None</Nominal_Frequency>
                    <Signal_Edge>Negative</Signal_Edge>
                    <Signal_Shutter_Delay>0</Signal_Shutter_Delay>
                    <Non_Periodic_Timeout>10.000</Non_Periodic_Timeout>
                </External_Time_Base>
                <External_Timestamp>
                    <Enabled>True</Enabled>
                    <Type>SMPTE</Type>
                    <Frequency>30</Frequency>
                </External_Timestamp>
                <Processing_Actions>
                    <PreProcessing2D>True</PreProcessing2D>
                    <Tracking>3D</Tracking>
                    <TwinSystemMerge>False</TwinSystemMerge>
                    <SplineFill>True</SplineFill>
                    <AIM>False</AIM>
                    <Track6DOF>True</Track6DOF>
                    <ForceData>False</ForceData>
                    <GazeVector>False</GazeVector>
                    <ExportTSV>True</ExportTSV>
                    <ExportC3D>False</ExportC3D>
                    <ExportMatlabFile>False</ExportMatlabFile>
                    <ExportAviFile>False</ExportAviFile>
                </Processing_Actions>
                <RealTime_Processing_Actions>
                    <PreProcessing2D>False</PreProcessing2D>
                    <Tracking>2D</Tracking>
                    <AIM>False</AIM>
                    <Track6DOF>False</Track6DOF>
                    <ForceData>False</ForceData>
                    <GazeVector>False</GazeVector>
                </RealTime_Processing_Actions>
                <Reprocessing_Actions>
                    <PreProcessing2D>False</PreProcessing2D>
                    <Tracking>False</Tracking>
                    <TwinSystemMerge>False</TwinSystemMerge>
                    <SplineFill>False</SplineFill>
                    <AIM>False</AIM>
                    <Track6DOF>False</Track6DOF>
                    <ForceData>True</ForceData>
                    <GazeVector>False</GazeVector>
                    <ExportTSV>False</ExportTSV>
                    <ExportC3D>False</ExportC3D>
                    <ExportMatlabFile>False</ExportMatlabFile>
                    <ExportAviFile>True</ExportAviFile>
                </Reprocessing_Actions>
                <EulerAngles First="Roll" Second="Pitch" Third="Yaw"/>
                <Camera>
                    <ID>1</ID>
                    <Model>Arqus A12</Model>
                    <Underwater>False</Underwater>
                    <Supports_HW_Sync>True</Supports_HW_Sync>
                    <Serial>21310</Serial>
                    <Mode>Marker</Mode>
                    <Video_Frequency>25</Video_Frequency>
                    <Video_Resolution>1080p</Video_Resolution>
                    <Video_Aspect_Ratio>16x9</Video_Aspect_Ratio>
                    <Video_Exposure>
                        <Current>500</Current>
                        <Min>5</Min>
                        <Max>39940</Max>
                    </Video_Exposure>
                    <Video_Flash_Time>
                        <Current>500</Current>
                        <Min>0</Min>
                        <Max>500</Max>
                    </Video_Flash_Time>
                    <Marker_Exposure>
                        <Current>300</Current>
                        <Min>5</Min>
                        <Max>1000</Max>
                    </Marker_Exposure>
                    <Marker_Threshold>
                        <Current>150</Current>
                        <Min>50</Min>
                        <Max>900</Max>
                    </Marker_Threshold>
                    <Position X="1284.500000" Y="-1325.250000" Z="2451.750000"
                        Rot_1_1="0.500000" Rot_1_2="0.250000" Rot_1_3="0.125000"
                        Rot_2_1="-0.250000" Rot_2_2="0.500000" Rot_2_3="0.250000"
                        Rot_3_1="0.125000" Rot_3_2="-0.250000" Rot_3_3="0.500000"/>
                    <Orientation>90</Orientation>
                    <Marker_Res>
                        <Width>4096</Width>
                        <Height>3072</Height>
                    </Marker_Res>
                    <Video_Res>
                        <Width>1920</Width>
                        <Height>1088</Height>
                    </Video_Res>
                    <Marker_FOV>
                        <Left>0</Left>
                        <Top>0</Top>
                        <Right>4095</Right>
                        <Bottom>3071</Bottom>
                    </Marker_FOV>
                    <Video_FOV>
                        <Left>0</Left>
                        <Top>0</Top>
                        <Right>1919</Right>
                        <Bottom>1087</Bottom>
                    </Video_FOV>
                    <Sync_Out>
                        <Mode>Multiplier</Mode>
                        <Value>2</Value>
                        <Duty_Cycle>50.000</Duty_Cycle>
                        <Signal_Polarity>Negative</Signal_Polarity>
                    </Sync_Out>
                    <Sync_Out2>
                        <Mode>Continuous 100Hz</Mode>
                    </Sync_Out2>
                    <LensControl>
                        <Focus Value="7.500000" Min="0.500000" Max="99.000000"/>
                        <Aperture Value="2.800000" Min="1.400000" Max="22.000000"/>
                    </LensControl>
                    <AutoExposure Enabled="true" Compensation="1.250000"/>
                    <AutoWhiteBalance>True</AutoWhiteBalance>
                </Camera>
            </General>
        </QTM_Parameters_Ver_1.25>
    "#;

    fn fixture() -> Document {
        Document::parse(GENERAL_FIXTURE).expect("parse general fixture")
    }

    #[test]
    fn reads_frequency_and_capture_time() {
        let doc = fixture();
        let settings = read_general_settings(doc.root(), V1_25)
            .expect("read")
            .expect("general present");
        assert_eq!(settings.capture_frequency, 100);
        assert_eq!(settings.capture_time, 10.0);
        assert!(!settings.start_on_external_trigger);
        assert_eq!(settings.trigger_no, Some(true));
        assert_eq!(settings.trigger_nc, Some(false));
    }

    #[test]
    fn reads_timebase_and_timestamp() {
        let doc = fixture();
        let settings = read_general_settings(doc.root(), V1_25)
            .expect("read")
            .expect("general present");
        let timebase = settings.external_timebase;
        assert!(timebase.enabled);
        assert_eq!(timebase.signal_source, SignalSource::IrReceiver);
        assert!(timebase.signal_mode_periodic);
        assert_eq!(timebase.frequency_multiplier, 2);
        assert!(timebase.nominal_frequency.is_nan());
        assert!(timebase.negative_edge);

        let timestamp = settings.external_timestamp.expect("timestamp present");
        assert!(timestamp.enabled);
        assert_eq!(timestamp.kind, TimestampKind::Smpte);
        assert_eq!(timestamp.frequency, 30);
    }

    #[test]
    fn reads_processing_action_lists() {
        let doc = fixture();
        let settings = read_general_settings(doc.root(), V1_25)
            .expect("read")
            .expect("general present");

        let live = settings.processing;
        assert!(live.contains(ProcessingActions::PRE_PROCESS_2D));
        assert!(live.contains(ProcessingActions::TRACKING_3D));
        assert!(!live.contains(ProcessingActions::TRACKING_2D));
        assert!(live.contains(ProcessingActions::SPLINE_FILL));
        assert!(live.contains(ProcessingActions::TRACK_6DOF));
        assert!(live.contains(ProcessingActions::EXPORT_TSV));

        let realtime = settings.realtime_processing.expect("realtime list");
        assert!(realtime.contains(ProcessingActions::TRACKING_2D));
        assert!(!realtime.contains(ProcessingActions::SPLINE_FILL));

        let reprocessing = settings.reprocessing.expect("reprocessing list");
        assert!(reprocessing.contains(ProcessingActions::FORCE_DATA));
        assert!(reprocessing.contains(ProcessingActions::EXPORT_AVI));
        assert!(!reprocessing.contains(ProcessingActions::TRACKING_3D));
    }

    #[test]
    fn reads_camera_details() {
        let doc = fixture();
        let settings = read_general_settings(doc.root(), V1_25)
            .expect("read")
            .expect("general present");
        assert_eq!(settings.cameras.len(), 1);

        let camera = &settings.cameras[0];
        assert_eq!(camera.id, 1);
        assert_eq!(camera.model, CameraModel::ArqusA12);
        assert_eq!(camera.mode, CameraMode::Marker);
        assert_eq!(camera.video_frequency, Some(25));
        assert_eq!(camera.video_resolution, Some(VideoResolution::P1080));
        assert_eq!(camera.marker_exposure.current, 300);
        assert_eq!(camera.orientation, 90);
        assert_eq!(camera.position.point.x, 1284.5);
        assert_eq!(camera.position.rotation[1][0], -0.25);
        assert_eq!(camera.marker_fov.right, 4095);

        let sync = camera.sync_out[0].expect("first sync out");
        assert_eq!(sync.mode, SyncOutMode::Multiplier);
        assert_eq!(sync.value, 2);
        assert!(sync.negative_polarity);
        let sync2 = camera.sync_out[1].expect("second sync out");
        assert_eq!(sync2.mode, SyncOutMode::FixedOneHundredHz);
        assert!(camera.sync_out[2].is_none());

        let lens = camera.lens_control.expect("lens control");
        assert_eq!(lens.focus.value, 7.5);
        assert_eq!(lens.aperture.max, 22.0);
        let auto = camera.auto_exposure.expect("auto exposure");
        assert!(auto.enabled);
        assert_eq!(auto.compensation, 1.25);
        assert_eq!(camera.auto_white_balance, Some(true));
    }

    #[test]
    fn absent_section_is_none() {
        let doc = Document::parse("<QTM_Parameters_Ver_1.25><The_3D/></QTM_Parameters_Ver_1.25>")
            .expect("parse");
        assert!(read_general_settings(doc.root(), V1_25)
            .expect("read")
            .is_none());
    }

    #[test]
    fn trigger_ports_ignored_below_gate() {
        let doc = fixture();
        let settings = read_general_settings(doc.root(), ProtocolVersion::new(1, 14))
            .expect("read")
            .expect("general present");
        assert_eq!(settings.trigger_no, None);
        assert_eq!(settings.trigger_nc, None);
        assert_eq!(settings.trigger_software, None);
    }

    #[test]
    fn unknown_camera_model_is_skipped_not_fatal() {
        let xml = GENERAL_FIXTURE.replace("Arqus A12", "Quantum Q1");
        let doc = Document::parse(&xml).expect("parse");
        let settings = read_general_settings(doc.root(), V1_25)
            .expect("read")
            .expect("general present");
        assert!(settings.cameras.is_empty());
    }

    #[test]
    fn missing_required_timing_field_fails() {
        let xml = GENERAL_FIXTURE.replace("<Capture_Time>10.000</Capture_Time>", "");
        let doc = Document::parse(&xml).expect("parse");
        let err = read_general_settings(doc.root(), V1_25).expect_err("must fail");
        assert!(matches!(err, SettingsError::MissingElement(name) if name == "Capture_Time"));
    }

    #[test]
    fn round_trip_at_current_version() {
        let doc = fixture();
        let mut settings = read_general_settings(doc.root(), V1_25)
            .expect("read")
            .expect("general present");

        let written = write_general_settings(&settings, V1_25);
        let timebase = written
            .root()
            .child("General")
            .and_then(|general| general.child("External_Time_Base"))
            .expect("timebase element");
        assert_eq!(timebase.child_text("Nominal_Frequency"), Some("None"));

        let mut reread = read_general_settings(written.root(), V1_25)
            .expect("reread")
            .expect("general present");

        // NaN never compares equal; pin the sentinel on both sides.
        assert!(reread.external_timebase.nominal_frequency.is_nan());
        settings.external_timebase.nominal_frequency = 0.0;
        reread.external_timebase.nominal_frequency = 0.0;
        assert_eq!(reread, settings);
    }

    #[test]
    fn round_trip_below_split_actions_gate() {
        let version = ProtocolVersion::new(1, 13);
        let mut settings = GeneralSettings {
            capture_frequency: 240,
            capture_time: 5.0,
            ..GeneralSettings::default()
        };
        settings.external_timebase.nominal_frequency = 200.0;
        settings.external_timebase.non_periodic_timeout = 10.0;
        settings.processing = ProcessingActions::TRACKING_3D | ProcessingActions::AIM;

        let written = write_general_settings(&settings, version);
        let general = written.root().child("General").expect("general element");
        assert!(!general.has_child("Start_On_Trigger_NO"));
        assert!(!general.has_child("RealTime_Processing_Actions"));
        let actions = general.child("Processing_Actions").expect("actions");
        assert!(!actions.has_child("PreProcessing2D"));
        assert_eq!(actions.child_text("Tracking"), Some("3D"));

        let reread = read_general_settings(written.root(), version)
            .expect("reread")
            .expect("general present");
        assert_eq!(reread, settings);
    }
}

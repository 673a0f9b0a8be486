//! Force plate settings, including the two generations of calibration
//! matrix encoding.

use qtm_xml::{Document, Element};
use tracing::{debug, warn};

use crate::model::Point3;
use crate::value::{child_f32_or_nan, push_f32, push_str, push_u32, required_parsed};
use crate::version::{Feature, ProtocolVersion};
use crate::{SettingsError, SETTINGS_ROOT};

pub const MATRIX_EXTENT: usize = 12;

/// Force plate calibration matrix.
///
/// Only `rows x columns` cells are meaningful; `valid` is false until a
/// `Calibration_Matrix` element has been read.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMatrix {
    pub rows: usize,
    pub columns: usize,
    pub cells: [[f32; MATRIX_EXTENT]; MATRIX_EXTENT],
    pub valid: bool,
}

impl Default for CalibrationMatrix {
    fn default() -> Self {
        CalibrationMatrix {
            rows: 0,
            columns: 0,
            cells: [[0.0; MATRIX_EXTENT]; MATRIX_EXTENT],
            valid: false,
        }
    }
}

/// One analog channel feeding a force plate.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceChannel {
    pub channel_number: u32,
    pub conversion_factor: f32,
}

/// One force plate.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcePlate {
    pub id: u32,
    pub analog_device_id: u32,
    pub frequency: u32,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub length: f32,
    pub width: f32,
    pub corners: [Point3; 4],
    pub origin: Point3,
    pub channels: Vec<ForceChannel>,
    pub calibration_matrix: CalibrationMatrix,
}

impl Default for ForcePlate {
    fn default() -> Self {
        ForcePlate {
            id: 0,
            analog_device_id: 0,
            frequency: 0,
            kind: None,
            name: None,
            length: f32::NAN,
            width: f32::NAN,
            corners: [Point3::default(); 4],
            origin: Point3::default(),
            channels: Vec::new(),
            calibration_matrix: CalibrationMatrix::default(),
        }
    }
}

/// The `Force` settings section.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForceSettings {
    pub unit_length: Option<String>,
    pub unit_force: Option<String>,
    pub plates: Vec<ForcePlate>,
}

/// Read the `Force` section, or `Ok(None)` when it is absent.
pub fn read_force_settings(
    root: &Element,
    version: ProtocolVersion,
) -> Result<Option<ForceSettings>, SettingsError> {
    let Some(elem) = root.child("Force") else {
        return Ok(None);
    };

    let mut settings = ForceSettings {
        unit_length: elem.child_text("Unit_Length").map(str::to_string),
        unit_force: elem.child_text("Unit_Force").map(str::to_string),
        plates: Vec::new(),
    };
    for plate_elem in elem.children("Plate") {
        match read_plate(plate_elem, version) {
            Ok(plate) => settings.plates.push(plate),
            Err(err) => warn!(error = %err, "skipping unreadable force plate"),
        }
    }

    debug!(plates = settings.plates.len(), "read force settings");
    Ok(Some(settings))
}

fn plate_id_element(version: ProtocolVersion) -> &'static str {
    if version.supports(Feature::PlateIdElement) {
        "Plate_ID"
    } else {
        "Force_Plate_Index"
    }
}

fn read_plate(elem: &Element, version: ProtocolVersion) -> Result<ForcePlate, SettingsError> {
    let mut plate = ForcePlate {
        id: required_parsed(elem, plate_id_element(version))?,
        analog_device_id: elem.child_parsed("Analog_Device_ID").unwrap_or(0),
        frequency: required_parsed(elem, "Frequency")?,
        kind: elem.child_text("Type").map(str::to_string),
        name: elem.child_text("Name").map(str::to_string),
        length: child_f32_or_nan(elem, "Length"),
        width: child_f32_or_nan(elem, "Width"),
        ..ForcePlate::default()
    };

    if let Some(location) = elem.child("Location") {
        for (index, corner) in plate.corners.iter_mut().enumerate() {
            let name = format!("Corner{}", index + 1);
            if let Some(corner_elem) = location.child(&name) {
                *corner = read_point(corner_elem);
            }
        }
    }
    if let Some(origin) = elem.child("Origin") {
        plate.origin = read_point(origin);
    }
    if let Some(channels_elem) = elem.child("Channels") {
        for channel_elem in channels_elem.children("Channel") {
            plate.channels.push(ForceChannel {
                channel_number: channel_elem.child_parsed("Channel_No").unwrap_or(0),
                conversion_factor: child_f32_or_nan(channel_elem, "ConversionFactor"),
            });
        }
    }
    if let Some(matrix_elem) = elem.child("Calibration_Matrix") {
        plate.calibration_matrix = if version.supports(Feature::NestedCalibrationMatrix) {
            read_matrix_nested(matrix_elem)
        } else {
            read_matrix_flat(matrix_elem)
        };
    }
    Ok(plate)
}

fn read_point(elem: &Element) -> Point3 {
    Point3::new(
        child_f32_or_nan(elem, "X"),
        child_f32_or_nan(elem, "Y"),
        child_f32_or_nan(elem, "Z"),
    )
}

/// `Row1/Col1` encoding: the extent is discovered by the first absent
/// row or column name.
fn read_matrix_flat(elem: &Element) -> CalibrationMatrix {
    let mut matrix = CalibrationMatrix {
        valid: true,
        ..CalibrationMatrix::default()
    };
    for row in 0..MATRIX_EXTENT {
        let Some(row_elem) = elem.child(&format!("Row{}", row + 1)) else {
            break;
        };
        let mut columns = 0;
        for column in 0..MATRIX_EXTENT {
            let Some(cell) = row_elem.child(&format!("Col{}", column + 1)) else {
                break;
            };
            matrix.cells[row][column] = cell.parse_text().unwrap_or(0.0);
            columns += 1;
        }
        matrix.columns = matrix.columns.max(columns);
        matrix.rows = row + 1;
    }
    matrix
}

/// `Rows/Row/Columns/Column` encoding.
fn read_matrix_nested(elem: &Element) -> CalibrationMatrix {
    let mut matrix = CalibrationMatrix {
        valid: true,
        ..CalibrationMatrix::default()
    };
    let Some(rows_elem) = elem.child("Rows") else {
        return matrix;
    };
    for (row, row_elem) in rows_elem.children("Row").take(MATRIX_EXTENT).enumerate() {
        if let Some(columns_elem) = row_elem.child("Columns") {
            let mut columns = 0;
            for (column, cell) in columns_elem
                .children("Column")
                .take(MATRIX_EXTENT)
                .enumerate()
            {
                matrix.cells[row][column] = cell.parse_text().unwrap_or(0.0);
                columns += 1;
            }
            matrix.columns = matrix.columns.max(columns);
        }
        matrix.rows = row + 1;
    }
    matrix
}

/// Build a settings document carrying the `Force` section.
pub fn write_force_settings(settings: &ForceSettings, version: ProtocolVersion) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("Force"));

    if let Some(unit) = &settings.unit_length {
        push_str(elem, "Unit_Length", unit);
    }
    if let Some(unit) = &settings.unit_force {
        push_str(elem, "Unit_Force", unit);
    }
    for plate in &settings.plates {
        write_plate(elem, plate, version);
    }

    Document::new(root)
}

fn write_plate(parent: &mut Element, plate: &ForcePlate, version: ProtocolVersion) {
    let elem = parent.push(Element::new("Plate"));
    push_u32(elem, plate_id_element(version), plate.id);
    push_u32(elem, "Analog_Device_ID", plate.analog_device_id);
    push_u32(elem, "Frequency", plate.frequency);
    if let Some(kind) = &plate.kind {
        push_str(elem, "Type", kind);
    }
    if let Some(name) = &plate.name {
        push_str(elem, "Name", name);
    }
    push_f32(elem, "Length", plate.length, 3);
    push_f32(elem, "Width", plate.width, 3);

    let location = elem.push(Element::new("Location"));
    for (index, corner) in plate.corners.iter().enumerate() {
        let corner_elem = location.push(Element::new(format!("Corner{}", index + 1)));
        write_point(corner_elem, *corner);
    }
    let origin = elem.push(Element::new("Origin"));
    write_point(origin, plate.origin);

    if !plate.channels.is_empty() {
        let channels_elem = elem.push(Element::new("Channels"));
        for channel in &plate.channels {
            let channel_elem = channels_elem.push(Element::new("Channel"));
            push_u32(channel_elem, "Channel_No", channel.channel_number);
            push_f32(channel_elem, "ConversionFactor", channel.conversion_factor, 6);
        }
    }
    if plate.calibration_matrix.valid {
        let matrix_elem = elem.push(Element::new("Calibration_Matrix"));
        if version.supports(Feature::NestedCalibrationMatrix) {
            write_matrix_nested(matrix_elem, &plate.calibration_matrix);
        } else {
            write_matrix_flat(matrix_elem, &plate.calibration_matrix);
        }
    }
}

fn write_point(elem: &mut Element, point: Point3) {
    push_f32(elem, "X", point.x, 3);
    push_f32(elem, "Y", point.y, 3);
    push_f32(elem, "Z", point.z, 3);
}

fn write_matrix_flat(elem: &mut Element, matrix: &CalibrationMatrix) {
    for row in 0..matrix.rows {
        let row_elem = elem.push(Element::new(format!("Row{}", row + 1)));
        for column in 0..matrix.columns {
            push_f32(
                row_elem,
                &format!("Col{}", column + 1),
                matrix.cells[row][column],
                6,
            );
        }
    }
}

fn write_matrix_nested(elem: &mut Element, matrix: &CalibrationMatrix) {
    let rows_elem = elem.push(Element::new("Rows"));
    for row in 0..matrix.rows {
        let row_elem = rows_elem.push(Element::new("Row"));
        let columns_elem = row_elem.push(Element::new("Columns"));
        for column in 0..matrix.columns {
            push_f32(columns_elem, "Column", matrix.cells[row][column], 6);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtm_xml::Document;

    const V1_25: ProtocolVersion = ProtocolVersion::new(1, 25);

    const FORCE_FIXTURE: &str = r#"
        <QTM_Parameters_Ver_1.25>
            <Force>
                <Unit_Length>mm</Unit_Length>
                <Unit_Force>N</Unit_Force>
                <Plate>
                    <Plate_ID>1</Plate_ID>
                    <Analog_Device_ID>1</Analog_Device_ID>
                    <Frequency>600</Frequency>
                    <Type>AMTI</Type>
                    <Name>Plate 1</Name>
                    <Length>600.000</Length>
                    <Width>400.000</Width>
                    <Location>
                        <Corner1><X>0.000</X><Y>0.000</Y><Z>0.000</Z></Corner1>
                        <Corner2><X>600.000</X><Y>0.000</Y><Z>0.000</Z></Corner2>
                        <Corner3><X>600.000</X><Y>400.000</Y><Z>0.000</Z></Corner3>
                        <Corner4><X>0.000</X><Y>400.000</Y><Z>0.000</Z></Corner4>
                    </Location>
                    <Origin><X>300.000</X><Y>200.000</Y><Z>-10.000</Z></Origin>
                    <Channels>
                        <Channel>
                            <Channel_No>1</Channel_No>
                            <ConversionFactor>500.000000</ConversionFactor>
                        </Channel>
                        <Channel>
                            <Channel_No>2</Channel_No>
                            <ConversionFactor>250.000000</ConversionFactor>
                        </Channel>
                    </Channels>
                    <Calibration_Matrix>
                        <Rows>
                            <Row>
                                <Columns>
                                    <Column>1.000000</Column>
                                    <Column>0.125000</Column>
                                    <Column>0.250000</Column>
                                </Columns>
                            </Row>
                            <Row>
                                <Columns>
                                    <Column>-0.125000</Column>
                                    <Column>1.000000</Column>
                                    <Column>0.500000</Column>
                                </Columns>
                            </Row>
                        </Rows>
                    </Calibration_Matrix>
                </Plate>
            </Force>
        </QTM_Parameters_Ver_1.25>
    "#;

    const LEGACY_MATRIX_FIXTURE: &str = r#"
        <QTM_Parameters_Ver_1.11>
            <Force>
                <Plate>
                    <Plate_ID>1</Plate_ID>
                    <Frequency>600</Frequency>
                    <Calibration_Matrix>
                        <Row1>
                            <Col1>1.000000</Col1>
                            <Col2>0.125000</Col2>
                            <Col3>0.250000</Col3>
                        </Row1>
                        <Row2>
                            <Col1>-0.125000</Col1>
                            <Col2>1.000000</Col2>
                            <Col3>0.500000</Col3>
                        </Row2>
                    </Calibration_Matrix>
                </Plate>
            </Force>
        </QTM_Parameters_Ver_1.11>
    "#;

    #[test]
    fn reads_plates_and_nested_matrix() {
        let doc = Document::parse(FORCE_FIXTURE).expect("parse fixture");
        let settings = read_force_settings(doc.root(), V1_25)
            .expect("read")
            .expect("force present");
        assert_eq!(settings.unit_length.as_deref(), Some("mm"));
        assert_eq!(settings.unit_force.as_deref(), Some("N"));
        assert_eq!(settings.plates.len(), 1);

        let plate = &settings.plates[0];
        assert_eq!(plate.id, 1);
        assert_eq!(plate.frequency, 600);
        assert_eq!(plate.kind.as_deref(), Some("AMTI"));
        assert_eq!(plate.length, 600.0);
        assert_eq!(plate.corners[2].y, 400.0);
        assert_eq!(plate.origin.z, -10.0);
        assert_eq!(plate.channels.len(), 2);
        assert_eq!(plate.channels[1].conversion_factor, 250.0);

        let matrix = &plate.calibration_matrix;
        assert!(matrix.valid);
        assert_eq!(matrix.rows, 2);
        assert_eq!(matrix.columns, 3);
        assert_eq!(matrix.cells[0][1], 0.125);
        assert_eq!(matrix.cells[1][0], -0.125);
    }

    #[test]
    fn matrix_encodings_agree() {
        let nested_doc = Document::parse(FORCE_FIXTURE).expect("parse nested fixture");
        let nested = read_force_settings(nested_doc.root(), V1_25)
            .expect("read")
            .expect("force present");

        let flat_doc = Document::parse(LEGACY_MATRIX_FIXTURE).expect("parse flat fixture");
        let flat = read_force_settings(flat_doc.root(), ProtocolVersion::new(1, 11))
            .expect("read")
            .expect("force present");

        let nested_matrix = &nested.plates[0].calibration_matrix;
        let flat_matrix = &flat.plates[0].calibration_matrix;
        assert_eq!(nested_matrix, flat_matrix);
    }

    #[test]
    fn plate_without_frequency_is_skipped() {
        let xml = FORCE_FIXTURE.replace("<Frequency>600</Frequency>", "");
        let doc = Document::parse(&xml).expect("parse");
        let settings = read_force_settings(doc.root(), V1_25)
            .expect("read")
            .expect("force present");
        assert!(settings.plates.is_empty());
    }

    #[test]
    fn plate_index_element_used_below_1_8() {
        let xml = LEGACY_MATRIX_FIXTURE
            .replace("QTM_Parameters_Ver_1.11", "QTM_Parameters_Ver_1.7")
            .replace("Plate_ID", "Force_Plate_Index");
        let doc = Document::parse(&xml).expect("parse");
        let settings = read_force_settings(doc.root(), ProtocolVersion::new(1, 7))
            .expect("read")
            .expect("force present");
        assert_eq!(settings.plates[0].id, 1);
    }

    #[test]
    fn missing_matrix_is_not_valid() {
        let doc = Document::parse(LEGACY_MATRIX_FIXTURE).expect("parse fixture");
        let mut settings = read_force_settings(doc.root(), ProtocolVersion::new(1, 11))
            .expect("read")
            .expect("force present");
        assert!(settings.plates[0].calibration_matrix.valid);

        let xml = LEGACY_MATRIX_FIXTURE.replace("Calibration_Matrix", "No_Matrix");
        let doc = Document::parse(&xml).expect("parse");
        settings = read_force_settings(doc.root(), ProtocolVersion::new(1, 11))
            .expect("read")
            .expect("force present");
        assert!(!settings.plates[0].calibration_matrix.valid);
        assert_eq!(settings.plates[0].calibration_matrix.rows, 0);
    }

    #[test]
    fn absent_section_is_none() {
        let doc = Document::parse("<QTM_Parameters_Ver_1.25><General/></QTM_Parameters_Ver_1.25>")
            .expect("parse");
        assert!(read_force_settings(doc.root(), V1_25).expect("read").is_none());
    }

    #[test]
    fn round_trip_nested_matrix() {
        let doc = Document::parse(FORCE_FIXTURE).expect("parse fixture");
        let settings = read_force_settings(doc.root(), V1_25)
            .expect("read")
            .expect("force present");

        let written = write_force_settings(&settings, V1_25);
        let reread = read_force_settings(written.root(), V1_25)
            .expect("reread")
            .expect("force present");
        assert_eq!(reread, settings);
    }

    #[test]
    fn round_trip_flat_matrix() {
        let version = ProtocolVersion::new(1, 11);
        let doc = Document::parse(LEGACY_MATRIX_FIXTURE).expect("parse fixture");
        let mut settings = read_force_settings(doc.root(), version)
            .expect("read")
            .expect("force present");
        // Pin the NaN geometry sentinels so the final equality holds.
        let plate = &mut settings.plates[0];
        plate.length = 600.0;
        plate.width = 400.0;
        for corner in &mut plate.corners {
            *corner = Point3::new(0.0, 0.0, 0.0);
        }
        plate.origin = Point3::new(0.0, 0.0, 0.0);

        let written = write_force_settings(&settings, version);
        let matrix_elem = written
            .root()
            .child("Force")
            .and_then(|force| force.child("Plate"))
            .and_then(|plate| plate.child("Calibration_Matrix"))
            .expect("matrix element");
        assert!(matrix_elem.has_child("Row1"));
        assert!(!matrix_elem.has_child("Rows"));

        let reread = read_force_settings(written.root(), version)
            .expect("reread")
            .expect("force present");
        assert_eq!(reread, settings);
    }
}

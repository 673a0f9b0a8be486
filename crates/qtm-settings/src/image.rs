//! Image streaming settings.

use qtm_xml::{Document, Element};
use tracing::{debug, warn};

use crate::value::{
    push_bool, push_f32, push_str, push_u32, required_bool, required_parsed, required_text,
};
use crate::{SettingsError, SETTINGS_ROOT};

/// Pixel format of a streamed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    RawGrayscale,
    RawBgr,
    #[default]
    Jpg,
    Png,
}

impl ImageFormat {
    pub const ALL: [ImageFormat; 4] = [
        ImageFormat::RawGrayscale,
        ImageFormat::RawBgr,
        ImageFormat::Jpg,
        ImageFormat::Png,
    ];

    pub const fn wire_name(self) -> &'static str {
        match self {
            ImageFormat::RawGrayscale => "RAWGrayscale",
            ImageFormat::RawBgr => "RAWBGR",
            ImageFormat::Jpg => "JPG",
            ImageFormat::Png => "PNG",
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|format| format.wire_name().eq_ignore_ascii_case(text))
    }
}

/// Image streaming configuration for one camera.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageCamera {
    pub id: u32,
    pub enabled: bool,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// Crop edges as fractions of the full sensor extent.
    pub left_crop: f32,
    pub top_crop: f32,
    pub right_crop: f32,
    pub bottom_crop: f32,
}

/// Read the `Image` section, or `Ok(None)` when it is absent.
pub fn read_image_settings(root: &Element) -> Result<Option<Vec<ImageCamera>>, SettingsError> {
    let Some(elem) = root.child("Image") else {
        return Ok(None);
    };

    let mut cameras = Vec::new();
    for camera_elem in elem.children("Camera") {
        match read_camera(camera_elem) {
            Ok(camera) => cameras.push(camera),
            Err(err) => warn!(error = %err, "skipping unreadable image camera"),
        }
    }
    debug!(cameras = cameras.len(), "read image settings");
    Ok(Some(cameras))
}

fn read_camera(elem: &Element) -> Result<ImageCamera, SettingsError> {
    let format_text = required_text(elem, "Format")?;
    let format = ImageFormat::from_wire(format_text)
        .ok_or_else(|| SettingsError::InvalidValue("Format".into(), format_text.into()))?;
    Ok(ImageCamera {
        id: required_parsed(elem, "ID")?,
        enabled: required_bool(elem, "Enabled")?,
        format,
        width: required_parsed(elem, "Width")?,
        height: required_parsed(elem, "Height")?,
        left_crop: required_parsed(elem, "Left_Crop")?,
        top_crop: required_parsed(elem, "Top_Crop")?,
        right_crop: required_parsed(elem, "Right_Crop")?,
        bottom_crop: required_parsed(elem, "Bottom_Crop")?,
    })
}

/// Build a settings document carrying the `Image` section.
pub fn write_image_settings(cameras: &[ImageCamera]) -> Document {
    let mut root = Element::new(SETTINGS_ROOT);
    let elem = root.push(Element::new("Image"));
    for camera in cameras {
        let camera_elem = elem.push(Element::new("Camera"));
        push_u32(camera_elem, "ID", camera.id);
        push_bool(camera_elem, "Enabled", camera.enabled);
        push_str(camera_elem, "Format", camera.format.wire_name());
        push_u32(camera_elem, "Width", camera.width);
        push_u32(camera_elem, "Height", camera.height);
        push_f32(camera_elem, "Left_Crop", camera.left_crop, 6);
        push_f32(camera_elem, "Top_Crop", camera.top_crop, 6);
        push_f32(camera_elem, "Right_Crop", camera.right_crop, 6);
        push_f32(camera_elem, "Bottom_Crop", camera.bottom_crop, 6);
    }
    Document::new(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtm_xml::Document;

    const IMAGE_FIXTURE: &str = r#"
        <QTM_Parameters_Ver_1.25>
            <Image>
                <Camera>
                    <ID>1</ID>
                    <Enabled>True</Enabled>
                    <Format>JPG</Format>
                    <Width>1920</Width>
                    <Height>1088</Height>
                    <Left_Crop>0.000000</Left_Crop>
                    <Top_Crop>0.000000</Top_Crop>
                    <Right_Crop>1.000000</Right_Crop>
                    <Bottom_Crop>1.000000</Bottom_Crop>
                </Camera>
                <Camera>
                    <ID>2</ID>
                    <Enabled>False</Enabled>
                    <Format>RAWGrayscale</Format>
                    <Width>640</Width>
                    <Height>480</Height>
                    <Left_Crop>0.250000</Left_Crop>
                    <Top_Crop>0.250000</Top_Crop>
                    <Right_Crop>0.750000</Right_Crop>
                    <Bottom_Crop>0.750000</Bottom_Crop>
                </Camera>
            </Image>
        </QTM_Parameters_Ver_1.25>
    "#;

    #[test]
    fn reads_image_cameras() {
        let doc = Document::parse(IMAGE_FIXTURE).expect("parse fixture");
        let cameras = read_image_settings(doc.root())
            .expect("read")
            .expect("image present");
        assert_eq!(cameras.len(), 2);
        assert_eq!(cameras[0].id, 1);
        assert!(cameras[0].enabled);
        assert_eq!(cameras[0].format, ImageFormat::Jpg);
        assert_eq!(cameras[1].format, ImageFormat::RawGrayscale);
        assert_eq!(cameras[1].left_crop, 0.25);
    }

    #[test]
    fn unknown_format_skips_camera() {
        let xml = IMAGE_FIXTURE.replace("<Format>JPG</Format>", "<Format>BMP</Format>");
        let doc = Document::parse(&xml).expect("parse");
        let cameras = read_image_settings(doc.root())
            .expect("read")
            .expect("image present");
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[0].id, 2);
    }

    #[test]
    fn absent_section_is_none() {
        let doc = Document::parse("<QTM_Parameters_Ver_1.25><General/></QTM_Parameters_Ver_1.25>")
            .expect("parse");
        assert!(read_image_settings(doc.root()).expect("read").is_none());
    }

    #[test]
    fn round_trip_preserves_cameras() {
        let doc = Document::parse(IMAGE_FIXTURE).expect("parse fixture");
        let cameras = read_image_settings(doc.root())
            .expect("read")
            .expect("image present");

        let written = write_image_settings(&cameras);
        let reread = read_image_settings(written.root())
            .expect("reread")
            .expect("image present");
        assert_eq!(reread, cameras);
    }
}

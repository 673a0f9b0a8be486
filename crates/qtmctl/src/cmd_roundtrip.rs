use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use qtm_rs::settings::{
    read_3d_settings, read_analog_settings, read_calibration_settings, read_eye_tracker_settings,
    read_force_settings, read_gaze_vector_settings, read_general_settings, read_image_settings,
    read_sixdof_settings, read_skeleton_settings, write_3d_settings, write_analog_settings,
    write_calibration_settings, write_eye_tracker_settings, write_force_settings,
    write_gaze_vector_settings, write_general_settings, write_image_settings,
    write_sixdof_settings, write_skeleton_settings,
};
use qtm_rs::{Document, Element, ProtocolVersion, Settings};

const DOMAINS: [&str; 10] = [
    "general",
    "3d",
    "6dof",
    "gaze",
    "eye-tracker",
    "analog",
    "force",
    "image",
    "skeleton",
    "calibration",
];

pub fn run(file: &Path, domain: Option<&str>) -> Result<()> {
    if let Some(name) = domain {
        if !DOMAINS.contains(&name) {
            bail!(
                "unknown domain '{name}', expected one of {}",
                DOMAINS.join(", ")
            );
        }
    }

    let xml =
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let snapshot = Settings::parse(&xml).context("parse settings document")?;
    info!(version = %snapshot.version, "parsed settings document");

    let mut checked = 0usize;
    for name in DOMAINS {
        if domain.is_some_and(|wanted| wanted != name) {
            continue;
        }
        let Some(emitted) = emit(&snapshot, name) else {
            continue;
        };
        check_stable(name, snapshot.version, &emitted)?;
        println!("{name}: ok");
        checked += 1;
    }

    if checked == 0 {
        match domain {
            Some(name) => println!("{name}: section not present"),
            None => println!("no sections present"),
        }
    }
    Ok(())
}

/// Emit one domain of the snapshot, `None` when the section is absent.
fn emit(snapshot: &Settings, name: &str) -> Option<Document> {
    let version = snapshot.version;
    match name {
        "general" => snapshot
            .general
            .as_ref()
            .map(|settings| write_general_settings(settings, version)),
        "3d" => snapshot.threed.as_ref().map(write_3d_settings),
        "6dof" => snapshot
            .sixdof
            .as_ref()
            .map(|settings| write_sixdof_settings(settings, version)),
        "gaze" => snapshot
            .gaze_vectors
            .as_ref()
            .map(|vectors| write_gaze_vector_settings(vectors)),
        "eye-tracker" => snapshot
            .eye_trackers
            .as_ref()
            .map(|devices| write_eye_tracker_settings(devices)),
        "analog" => snapshot
            .analog
            .as_ref()
            .map(|settings| write_analog_settings(settings, version)),
        "force" => snapshot
            .force
            .as_ref()
            .map(|settings| write_force_settings(settings, version)),
        "image" => snapshot
            .image_cameras
            .as_ref()
            .map(|cameras| write_image_settings(cameras)),
        "skeleton" => snapshot
            .skeletons
            .as_ref()
            .map(|settings| write_skeleton_settings(settings, version)),
        "calibration" => snapshot.calibration.as_ref().map(write_calibration_settings),
        _ => None,
    }
}

/// Print the emitted document, read it back, emit again and require the
/// two prints to agree byte for byte.
fn check_stable(name: &str, version: ProtocolVersion, emitted: &Document) -> Result<()> {
    let first = emitted.to_xml().context("serialize emitted document")?;
    let reparsed = Document::parse(&first).context("reparse emitted document")?;
    let second_doc = reemit(reparsed.root(), name, version)?
        .ok_or_else(|| anyhow!("{name}: section lost on read back"))?;
    let second = second_doc.to_xml().context("serialize re-read document")?;
    if first != second {
        bail!("{name}: output changed after a read back");
    }
    Ok(())
}

fn reemit(root: &Element, name: &str, version: ProtocolVersion) -> Result<Option<Document>> {
    let doc = match name {
        "general" => read_general_settings(root, version)?
            .map(|settings| write_general_settings(&settings, version)),
        "3d" => read_3d_settings(root)?.map(|settings| write_3d_settings(&settings)),
        "6dof" => read_sixdof_settings(root, version)?
            .map(|settings| write_sixdof_settings(&settings, version)),
        "gaze" => {
            read_gaze_vector_settings(root)?.map(|vectors| write_gaze_vector_settings(&vectors))
        }
        "eye-tracker" => {
            read_eye_tracker_settings(root)?.map(|devices| write_eye_tracker_settings(&devices))
        }
        "analog" => read_analog_settings(root, version)?
            .map(|settings| write_analog_settings(&settings, version)),
        "force" => read_force_settings(root, version)?
            .map(|settings| write_force_settings(&settings, version)),
        "image" => read_image_settings(root)?.map(|cameras| write_image_settings(&cameras)),
        "skeleton" => read_skeleton_settings(root, version)?
            .map(|settings| write_skeleton_settings(&settings, version)),
        "calibration" => {
            read_calibration_settings(root)?.map(|settings| write_calibration_settings(&settings))
        }
        _ => None,
    };
    Ok(doc)
}

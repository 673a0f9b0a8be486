use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use qtm_rs::Settings;

pub fn run(file: &Path) -> Result<()> {
    let xml =
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let snapshot = Settings::parse(&xml).context("parse settings document")?;
    info!(version = %snapshot.version, "parsed settings document");

    println!("protocol version {}", snapshot.version);
    if let Some(general) = &snapshot.general {
        println!(
            "general: {} Hz for {:.1} s, {} cameras",
            general.capture_frequency,
            general.capture_time,
            general.cameras.len()
        );
    }
    if let Some(threed) = &snapshot.threed {
        println!(
            "3d: {} labels, {} bones, up axis {}",
            threed.labels.len(),
            threed.bones.len(),
            threed.axis_upwards.wire_name()
        );
    }
    if let Some(sixdof) = &snapshot.sixdof {
        println!("6dof: {} bodies", sixdof.bodies.len());
    }
    if let Some(vectors) = &snapshot.gaze_vectors {
        println!("gaze: {} vectors", vectors.len());
    }
    if let Some(devices) = &snapshot.eye_trackers {
        println!("eye-tracker: {} devices", devices.len());
    }
    if let Some(analog) = &snapshot.analog {
        println!("analog: {} devices", analog.devices.len());
    }
    if let Some(force) = &snapshot.force {
        println!("force: {} plates", force.plates.len());
    }
    if let Some(cameras) = &snapshot.image_cameras {
        println!("image: {} cameras", cameras.len());
    }
    if let Some(skeletons) = &snapshot.skeletons {
        let segments: usize = skeletons
            .skeletons
            .iter()
            .map(|skeleton| skeleton.segments.len())
            .sum();
        println!(
            "skeleton: {} skeletons, {} segments",
            skeletons.skeletons.len(),
            segments
        );
    }
    if let Some(calibration) = &snapshot.calibration {
        println!(
            "calibration: {}, {} cameras",
            calibration.kind.wire_name(),
            calibration.cameras.len()
        );
    }
    if snapshot.section_count() == 0 {
        println!("no sections present");
    }

    Ok(())
}

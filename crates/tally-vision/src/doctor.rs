use anyhow::Result;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::config::CameraConfig;
use crate::source::SourceConfig;

pub fn check_unique_ids(cams: &[CameraConfig]) -> Result<()> {
    anyhow::ensure!(!cams.is_empty(), "no [[cameras]] configured");
    let mut seen = HashSet::new();
    for c in cams {
        anyhow::ensure!(seen.insert(c.id.as_str()), "duplicate camera id: {}", c.id);
    }
    Ok(())
}

pub fn check_camera(cam: &CameraConfig) -> Result<()> {
    let settings = cam.validate()?;
    match &cam.source {
        SourceConfig::File { path } => {
            anyhow::ensure!(Path::new(path).is_file(), "source file not found: {}", path);
        }
        SourceConfig::Command { program, .. } => {
            anyhow::ensure!(!program.trim().is_empty(), "source.program is empty");
        }
    }
    if settings.direction.threshold < 3 {
        warn!("camera {}: movement_threshold={} is very low, jitter may count as crossings", cam.id, settings.direction.threshold);
    }
    if settings.evict_after_frames.is_none() {
        info!("camera {}: no evict_after_frames, track table grows for the whole run", cam.id);
    }
    Ok(())
}

/// Checks every camera and returns how many failed.
pub fn check_cameras(cams: &[CameraConfig]) -> usize {
    let mut failed = 0;
    for c in cams {
        match check_camera(c) {
            Ok(()) => info!("doctor: camera {} OK", c.id),
            Err(e) => {
                warn!("doctor: camera {}: {:#}", c.id, e);
                failed += 1;
            }
        }
    }
    failed
}

pub mod classifier;
pub mod config;
pub mod doctor;
pub mod geometry;
pub mod registry;
pub mod remap;
pub mod runner;
pub mod source;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use config::{Axis, CameraConfig, CameraSettings, ConfigError, DirectionConfig, EntryDirection};
pub use geometry::{BBox, Point, Region};
pub use worker::{CameraWorker, FrameReport, Marker, Observation};

/// One detection as reported by the external detect-and-track stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    /// Producer-assigned track id; absent until the tracker has confirmed the object.
    #[serde(default)]
    pub track_id: Option<i64>,
    /// x1, y1, x2, y2 in pixels
    pub bbox: [f64; 4],
    #[serde(rename = "class", default)]
    pub class_label: String,
    #[serde(default)]
    pub conf: Option<f32>,
}

impl RawDetection {
    pub fn new(track_id: Option<i64>, bbox: [f64; 4], class_label: &str) -> Self {
        Self { track_id, bbox, class_label: class_label.to_string(), conf: None }
    }
}

/// All detections of one video frame, in detector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

impl Frame {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self { detections }
    }
}

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::geometry::{Point, Region};
use crate::source::SourceConfig;

pub const DEFAULT_MOVEMENT_THRESHOLD: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("roi must have >= 3 points, got {0}")]
    RegionTooSmall(usize),
    #[error("roi vertex ({x}, {y}) is out of pixel range")]
    RegionOutOfRange { x: i64, y: i64 },
    #[error("unknown direction_mode: {0}")]
    UnknownAxis(String),
    #[error("unknown entry_direction: {0}")]
    UnknownDirection(String),
    #[error("entry_direction {direction} does not fit direction_mode {axis}")]
    AxisMismatch { axis: Axis, direction: EntryDirection },
    #[error("movement_threshold must be > 0, got {0}")]
    NonPositiveThreshold(i64),
    #[error("evict_after_frames must be > 0")]
    ZeroEviction,
    #[error("camera id must not be empty")]
    EmptyId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl FromStr for Axis {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertical" => Ok(Self::Vertical),
            "horizontal" => Ok(Self::Horizontal),
            other => Err(ConfigError::UnknownAxis(other.to_string())),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertical => "vertical",
            Self::Horizontal => "horizontal",
        })
    }
}

/// Which way along the axis counts as ENTRY. The opposite way is EXIT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryDirection {
    TopToBottom,
    BottomToTop,
    LeftToRight,
    RightToLeft,
}

impl EntryDirection {
    pub fn axis(&self) -> Axis {
        match self {
            Self::TopToBottom | Self::BottomToTop => Axis::Vertical,
            Self::LeftToRight | Self::RightToLeft => Axis::Horizontal,
        }
    }

    /// Sign of the coordinate change that means ENTRY (image y grows downwards).
    pub fn entry_sign(&self) -> i64 {
        match self {
            Self::TopToBottom | Self::LeftToRight => 1,
            Self::BottomToTop | Self::RightToLeft => -1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TopToBottom => "Entry: Top to Bottom",
            Self::BottomToTop => "Entry: Bottom to Top",
            Self::LeftToRight => "Entry: Left to Right",
            Self::RightToLeft => "Entry: Right to Left",
        }
    }
}

impl FromStr for EntryDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_to_bottom" => Ok(Self::TopToBottom),
            "bottom_to_top" => Ok(Self::BottomToTop),
            "left_to_right" => Ok(Self::LeftToRight),
            "right_to_left" => Ok(Self::RightToLeft),
            other => Err(ConfigError::UnknownDirection(other.to_string())),
        }
    }
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TopToBottom => "top_to_bottom",
            Self::BottomToTop => "bottom_to_top",
            Self::LeftToRight => "left_to_right",
            Self::RightToLeft => "right_to_left",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionConfig {
    pub entry: EntryDirection,
    /// Minimum displacement in pixels; must be strictly exceeded.
    pub threshold: i64,
}

impl DirectionConfig {
    pub fn new(entry: EntryDirection, threshold: i64) -> Result<Self, ConfigError> {
        if threshold <= 0 {
            return Err(ConfigError::NonPositiveThreshold(threshold));
        }
        Ok(Self { entry, threshold })
    }

    pub fn axis(&self) -> Axis {
        self.entry.axis()
    }
}

fn default_threshold() -> i64 {
    DEFAULT_MOVEMENT_THRESHOLD
}

/// Per-camera section as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub roi: Vec<[i64; 2]>,
    pub direction_mode: String,
    pub entry_direction: String,
    #[serde(default = "default_threshold")]
    pub movement_threshold: i64,
    /// Only these class labels are counted; everything else is ignored.
    #[serde(default)]
    pub classes: Option<Vec<String>>,
    /// Forget tracks not seen for this many frames.
    #[serde(default)]
    pub evict_after_frames: Option<u64>,
    pub source: SourceConfig,
}

/// Validated, immutable camera settings handed to a worker.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub id: String,
    pub region: Region,
    pub direction: DirectionConfig,
    pub classes: Option<HashSet<String>>,
    pub evict_after_frames: Option<u64>,
}

impl CameraConfig {
    pub fn validate(&self) -> Result<CameraSettings, ConfigError> {
        if self.id.trim().is_empty() {
            return Err(ConfigError::EmptyId);
        }
        let region = Region::new(self.roi.iter().copied().map(Point::from).collect())?;
        let axis: Axis = self.direction_mode.parse()?;
        let entry: EntryDirection = self.entry_direction.parse()?;
        if entry.axis() != axis {
            return Err(ConfigError::AxisMismatch { axis, direction: entry });
        }
        let direction = DirectionConfig::new(entry, self.movement_threshold)?;
        if self.evict_after_frames == Some(0) {
            return Err(ConfigError::ZeroEviction);
        }
        Ok(CameraSettings {
            id: self.id.clone(),
            region,
            direction,
            classes: self.classes.as_ref().map(|c| c.iter().cloned().collect()),
            evict_after_frames: self.evict_after_frames,
        })
    }
}

impl CameraSettings {
    pub fn new(id: &str, region: Region, direction: DirectionConfig) -> Self {
        Self {
            id: id.to_string(),
            region,
            direction,
            classes: None,
            evict_after_frames: None,
        }
    }

    pub fn accepts_class(&self, label: &str) -> bool {
        self.classes.as_ref().map_or(true, |c| c.contains(label))
    }
}

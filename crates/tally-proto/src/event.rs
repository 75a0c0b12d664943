use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Entry,
    Exit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "ENTRY",
            Self::Exit => "EXIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running per-camera totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub entries: u64,
    pub exits: u64,
}

impl CounterSnapshot {
    pub fn total(&self) -> u64 {
        self.entries + self.exits
    }
}

/// One classified crossing. Counts are the camera totals including this event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingEvent {
    /// ISO-8601, second precision, UTC
    pub timestamp: String,
    pub camera_id: String,
    pub direction: Direction,
    pub track_id: u64,
    pub class_label: String,
    pub entry_count: u64,
    pub exit_count: u64,
}

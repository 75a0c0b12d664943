use serde::Serialize;
use tally_proto::{CounterSnapshot, CrossingEvent, Direction};
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::classifier::decide;
use crate::config::CameraSettings;
use crate::geometry::{BBox, BoxError};
use crate::registry::{TrackRegistry, TrackState};
use crate::remap::IdRemapper;
use crate::{Frame, RawDetection};

/// Overlay hint for a renderer. Has no influence on counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Marker {
    /// center outside the ROI (gray)
    Outside,
    /// inside, not yet classified (yellow)
    Pending,
    /// green
    Entered,
    /// red
    Exited,
}

impl Marker {
    fn for_state(state: TrackState) -> Self {
        match state {
            TrackState::Unclassified => Self::Pending,
            TrackState::Entered => Self::Entered,
            TrackState::Exited => Self::Exited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub track_id: u64,
    pub bbox: BBox,
    pub inside: bool,
    pub marker: Marker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    NoTrackId,
    ClassFiltered,
    Malformed(BoxError),
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub observations: Vec<Observation>,
    pub events: Vec<CrossingEvent>,
    pub skipped: usize,
    pub evicted: usize,
    pub counters: CounterSnapshot,
}

/// Crossing state for one camera. Owned by exactly one task; frames must be
/// fed in order.
#[derive(Debug)]
pub struct CameraWorker {
    settings: CameraSettings,
    ids: IdRemapper,
    tracks: TrackRegistry,
    counters: CounterSnapshot,
    frame: u64,
}

impl CameraWorker {
    pub fn new(settings: CameraSettings) -> Self {
        info!(
            "camera {}: roi={} pts, {}, threshold={}px",
            settings.id,
            settings.region.points().len(),
            settings.direction.entry.label(),
            settings.direction.threshold
        );
        Self {
            settings,
            ids: IdRemapper::new(),
            tracks: TrackRegistry::new(),
            counters: CounterSnapshot::default(),
            frame: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters
    }

    pub fn tracks(&self) -> &TrackRegistry {
        &self.tracks
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame
    }

    /// Detector ids with a live display id mapping.
    pub fn known_ids(&self) -> usize {
        self.ids.mapped()
    }

    pub fn display_id(&self, raw_id: i64) -> Option<u64> {
        self.ids.lookup(raw_id)
    }

    pub fn process_frame(&mut self, frame: &Frame, now: OffsetDateTime) -> FrameReport {
        self.frame += 1;
        let mut report = FrameReport { frame: self.frame, ..Default::default() };

        for det in &frame.detections {
            match self.process_detection(det, now, &mut report.events) {
                Ok(obs) => report.observations.push(obs),
                Err(skip) => {
                    debug!("camera {}: frame {} skip detection ({:?})", self.settings.id, self.frame, skip);
                    report.skipped += 1;
                }
            }
        }

        if let Some(max_idle) = self.settings.evict_after_frames {
            let gone = self.tracks.evict_idle(self.frame, max_idle);
            if !gone.is_empty() {
                debug!("camera {}: evicted {} idle tracks", self.settings.id, gone.len());
                self.ids.retire(&gone);
                report.evicted = gone.len();
            }
        }

        report.counters = self.counters;
        report
    }

    fn process_detection(
        &mut self,
        det: &RawDetection,
        now: OffsetDateTime,
        events: &mut Vec<CrossingEvent>,
    ) -> Result<Observation, Skip> {
        if !self.settings.accepts_class(&det.class_label) {
            return Err(Skip::ClassFiltered);
        }
        let raw_id = det.track_id.ok_or(Skip::NoTrackId)?;
        let bbox = BBox::from_raw(&det.bbox).map_err(Skip::Malformed)?;

        let track_id = self.ids.remap(raw_id);
        let prev = self.tracks.observe(track_id, self.frame).clone();
        let position = bbox.axis_position(self.settings.direction.axis());

        if !self.settings.region.contains_box(&bbox) {
            return Ok(Observation { track_id, bbox, inside: false, marker: Marker::Outside });
        }

        let mut state = prev.state;
        if let (Some(last), TrackState::Unclassified) = (prev.last_position, prev.state) {
            if let Some(direction) = decide(last, position, &self.settings.direction) {
                match self.tracks.classify(track_id, direction.into()) {
                    Ok(()) => {
                        state = direction.into();
                        events.push(self.record(direction, track_id, &det.class_label, now));
                    }
                    Err(e) => warn!("camera {}: {}", self.settings.id, e),
                }
            }
        }
        self.tracks.upsert_position(track_id, position);

        Ok(Observation { track_id, bbox, inside: true, marker: Marker::for_state(state) })
    }

    fn record(&mut self, direction: Direction, track_id: u64, class_label: &str, now: OffsetDateTime) -> CrossingEvent {
        match direction {
            Direction::Entry => self.counters.entries += 1,
            Direction::Exit => self.counters.exits += 1,
        }
        CrossingEvent {
            timestamp: iso_seconds(now),
            camera_id: self.settings.id.clone(),
            direction,
            track_id,
            class_label: class_label.to_string(),
            entry_count: self.counters.entries,
            exit_count: self.counters.exits,
        }
    }
}

/// `2026-10-16T08:30:00Z` style timestamp, UTC, whole seconds.
pub fn iso_seconds(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(time::UtcOffset::UTC);
    ts.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"))
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

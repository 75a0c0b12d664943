use std::collections::VecDeque;
use tally_proto::Direction;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    Unclassified,
    Entered,
    Exited,
}

impl TrackState {
    pub fn is_classified(&self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl From<Direction> for TrackState {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Entry => Self::Entered,
            Direction::Exit => Self::Exited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: u64,
    /// Axis position of the last in-region observation.
    pub last_position: Option<i64>,
    pub state: TrackState,
    pub last_seen_frame: u64,
}

impl Track {
    fn new(id: u64) -> Self {
        Self { id, last_position: None, state: TrackState::Unclassified, last_seen_frame: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("track {0} is not registered")]
    UnknownTrack(u64),
    #[error("track {id} already classified as {state:?}")]
    AlreadyClassified { id: u64, state: TrackState },
    #[error("cannot classify track {0} back to unclassified")]
    Unclassified(u64),
}

/// Per-camera track arena indexed by display id.
///
/// Display ids are handed out sequentially, so slots form a window starting
/// at `base`; evicted slots at the front are released.
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    base: u64,
    slots: VecDeque<Option<Track>>,
    live: usize,
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self { base: 1, slots: VecDeque::new(), live: 0 }
    }

    pub fn get(&self, id: u64) -> Option<&Track> {
        let idx = self.index(id)?;
        self.slots.get(idx)?.as_ref()
    }

    /// Registers the track if needed and stamps the frame it was seen in.
    pub fn observe(&mut self, id: u64, frame: u64) -> &Track {
        let t = self.entry(id);
        t.last_seen_frame = frame;
        t
    }

    pub fn upsert_position(&mut self, id: u64, position: i64) {
        self.entry(id).last_position = Some(position);
    }

    /// One-way transition out of `Unclassified`.
    pub fn classify(&mut self, id: u64, state: TrackState) -> Result<(), ClassifyError> {
        if !state.is_classified() {
            return Err(ClassifyError::Unclassified(id));
        }
        let t = self.get_mut(id).ok_or(ClassifyError::UnknownTrack(id))?;
        if t.state.is_classified() {
            return Err(ClassifyError::AlreadyClassified { id, state: t.state });
        }
        t.state = state;
        Ok(())
    }

    /// Drops tracks whose last sighting is more than `max_idle` frames before `frame`.
    pub fn evict_idle(&mut self, frame: u64, max_idle: u64) -> Vec<u64> {
        let mut evicted = Vec::new();
        for slot in self.slots.iter_mut() {
            let idle = slot.as_ref().is_some_and(|t| frame.saturating_sub(t.last_seen_frame) > max_idle);
            if idle {
                if let Some(t) = slot.take() {
                    evicted.push(t.id);
                }
            }
        }
        self.live -= evicted.len();
        while matches!(self.slots.front(), Some(None)) {
            self.slots.pop_front();
            self.base += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.slots.iter().flatten()
    }

    pub fn count_in(&self, state: TrackState) -> usize {
        self.iter().filter(|t| t.state == state).count()
    }

    fn index(&self, id: u64) -> Option<usize> {
        id.checked_sub(self.base).map(|i| i as usize)
    }

    fn get_mut(&mut self, id: u64) -> Option<&mut Track> {
        let idx = self.index(id)?;
        self.slots.get_mut(idx)?.as_mut()
    }

    fn entry(&mut self, id: u64) -> &mut Track {
        // Ids below the window were evicted; they come back as fresh slots at the front.
        while id < self.base {
            self.slots.push_front(None);
            self.base -= 1;
        }
        let idx = (id - self.base) as usize;
        if idx >= self.slots.len() {
            self.slots.resize(idx + 1, None);
        }
        let slot = &mut self.slots[idx];
        if slot.is_none() {
            self.live += 1;
        }
        slot.get_or_insert_with(|| Track::new(id))
    }
}

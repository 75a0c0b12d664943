pub mod doctor;
mod journal;

use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_proto::{CrossingEvent, EventSink};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, warn};

use journal::Journal;

fn default_capacity() -> usize {
    1024
}

fn default_journal_max_mb() -> u64 {
    64
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_capacity")]
    pub channel_capacity: usize,
    /// Optional JSON-lines file receiving every delivered event.
    pub journal_path: Option<String>,
    #[serde(default = "default_journal_max_mb")]
    pub journal_max_mb: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_capacity(),
            journal_path: None,
            journal_max_mb: default_journal_max_mb(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub delivered: u64,
    pub dropped: u64,
    pub journal_failures: u32,
}

/// Cloneable producer half handed to camera workers. Never blocks.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<CrossingEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for EventSender {
    fn emit(&self, ev: CrossingEvent) {
        match self.tx.try_send(ev) {
            Ok(()) => {}
            Err(TrySendError::Full(ev)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!("sink: queue full, dropped {} event for camera {} (dropped total: {})", ev.direction, ev.camera_id, n);
            }
            Err(TrySendError::Closed(ev)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("sink: closed, dropped {} event for camera {}", ev.direction, ev.camera_id);
            }
        }
    }
}

/// Consumer half; drain it with [`Sink::run`] on its own task.
pub struct Sink {
    rx: mpsc::Receiver<CrossingEvent>,
    journal: Option<Journal>,
    dropped: Arc<AtomicU64>,
    stats: SinkStats,
}

pub fn channel(cfg: &SinkConfig) -> (EventSender, Sink) {
    let (tx, rx) = mpsc::channel(cfg.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let journal = cfg
        .journal_path
        .as_ref()
        .map(|p| Journal::new(p, cfg.journal_max_mb.saturating_mul(1024 * 1024)));
    (
        EventSender { tx, dropped: dropped.clone() },
        Sink { rx, journal, dropped, stats: SinkStats::default() },
    )
}

impl Sink {
    /// Runs until every [`EventSender`] is gone.
    pub async fn run(mut self) -> SinkStats {
        while let Some(ev) = self.rx.recv().await {
            self.deliver(&ev).await;
        }
        self.stats.dropped = self.dropped.load(Ordering::Relaxed);
        info!(
            "sink: closed (delivered={}, dropped={}, journal_failures={})",
            self.stats.delivered, self.stats.dropped, self.stats.journal_failures
        );
        self.stats
    }

    async fn deliver(&mut self, ev: &CrossingEvent) {
        info!(
            target: "tally::event",
            "{}, Camera ID: {}, Direction: {}, Vehicle Type: {}, Track: {}, Entry Count: {}, Exit Count: {}",
            ev.timestamp, ev.camera_id, ev.direction, ev.class_label, ev.track_id, ev.entry_count, ev.exit_count
        );
        self.stats.delivered += 1;

        if let Some(j) = self.journal.as_mut() {
            if let Err(e) = j.append(ev).await {
                self.stats.journal_failures += 1;
                warn!("sink: journal write failed, journal disabled: {:#}", e);
                self.journal = None;
            }
        }
    }
}

use anyhow::Result;
use std::sync::{Arc, Mutex};
use tally_proto::{CounterSnapshot, EventSink};
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::source::FrameSource;
use crate::worker::CameraWorker;

/// Live per-camera figures for status queries.
#[derive(Debug, Clone, Default)]
pub struct CameraStatus {
    pub frames: u64,
    pub tracks: usize,
    /// Detector ids currently mapped; drops when idle tracks are evicted.
    pub ids: usize,
    pub counters: CounterSnapshot,
    pub finished: bool,
}

pub type SharedStatus = Arc<Mutex<CameraStatus>>;

/// Feeds frames from `source` through `worker` until the stream ends or
/// `shutdown` flips to true. Frames are handled strictly one after another.
pub async fn run_camera(
    mut worker: CameraWorker,
    mut source: FrameSource,
    sink: &dyn EventSink,
    status: SharedStatus,
    mut shutdown: watch::Receiver<bool>,
) -> Result<CounterSnapshot> {
    let cam = worker.id().to_string();
    info!("camera {}: running", cam);

    let outcome = loop {
        let stop = *shutdown.borrow();
        if stop {
            info!("camera {}: shutdown requested", cam);
            break Ok(());
        }
        let next = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    debug!("camera {}: shutdown channel closed", cam);
                    break Ok(());
                }
                continue;
            }
            next = source.next_frame() => next,
        };
        let frame = match next {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("camera {}: end of stream", cam);
                break Ok(());
            }
            Err(e) => break Err(e),
        };

        let report = worker.process_frame(&frame, OffsetDateTime::now_utc());
        for ev in report.events {
            sink.emit(ev);
        }
        publish(&status, &worker, false);
    };

    source.close().await;
    publish(&status, &worker, true);
    let counters = worker.counters();
    info!(
        "camera {}: stopped after {} frames (entry={}, exit={})",
        cam,
        worker.frames_processed(),
        counters.entries,
        counters.exits
    );
    outcome.map(|()| counters)
}

fn publish(status: &SharedStatus, worker: &CameraWorker, finished: bool) {
    match status.lock() {
        Ok(mut st) => {
            st.frames = worker.frames_processed();
            st.tracks = worker.tracks().len();
            st.ids = worker.known_ids();
            st.counters = worker.counters();
            st.finished = finished;
        }
        Err(_) => warn!("camera {}: status lock poisoned", worker.id()),
    }
}

use std::sync::{Arc, Mutex};

use tally_proto::{CrossingEvent, Direction, EventSink};
use tally_vision::registry::TrackState;
use tally_vision::runner::{run_camera, CameraStatus};
use tally_vision::source::FrameSource;
use tally_vision::{CameraSettings, CameraWorker, DirectionConfig, EntryDirection, Frame, Point, RawDetection, Region};
use time::macros::datetime;
use time::OffsetDateTime;

const NOW: OffsetDateTime = datetime!(2026-10-16 12:00:00 UTC);

fn roi() -> Region {
    Region::new(vec![
        Point::new(100, 50),
        Point::new(500, 50),
        Point::new(500, 450),
        Point::new(100, 450),
    ])
    .unwrap()
}

fn worker(entry: EntryDirection, threshold: i64) -> CameraWorker {
    CameraWorker::new(CameraSettings::new("gate", roi(), DirectionConfig::new(entry, threshold).unwrap()))
}

/// 40x40 box centered at (cx, cy).
fn det(raw: i64, cx: i64, cy: i64) -> RawDetection {
    let (cx, cy) = (cx as f64, cy as f64);
    RawDetection::new(Some(raw), [cx - 20.0, cy - 20.0, cx + 20.0, cy + 20.0], "car")
}

fn feed(w: &mut CameraWorker, frames: Vec<Vec<RawDetection>>) -> Vec<CrossingEvent> {
    frames
        .into_iter()
        .flat_map(|dets| w.process_frame(&Frame::new(dets), NOW).events)
        .collect()
}

#[test]
fn basic_entry_vertical_top_to_bottom() {
    let mut w = worker(EntryDirection::TopToBottom, 10);
    let events = feed(&mut w, vec![vec![det(501, 300, 100)], vec![det(501, 300, 115)]]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Entry);
    assert_eq!(w.counters().entries, 1);
    assert_eq!(w.counters().exits, 0);
}

#[test]
fn basic_exit_horizontal_left_to_right() {
    let mut w = worker(EntryDirection::LeftToRight, 10);
    let events = feed(&mut w, vec![vec![det(8, 200, 200)], vec![det(8, 185, 200)]]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Exit);
    assert_eq!(w.counters().exits, 1);
}

#[test]
fn small_move_only_refreshes_baseline() {
    let mut w = worker(EntryDirection::TopToBottom, 10);
    let events = feed(&mut w, vec![vec![det(1, 300, 100)], vec![det(1, 300, 105)]]);
    assert!(events.is_empty());
    let t = w.tracks().get(1).unwrap();
    assert_eq!(t.state, TrackState::Unclassified);
    assert_eq!(t.last_position, Some(105));

    // 105 -> 114 is still only 9 past the refreshed baseline
    assert!(feed(&mut w, vec![vec![det(1, 300, 114)]]).is_empty());
}

#[test]
fn threshold_boundary() {
    let mut w = worker(EntryDirection::BottomToTop, 10);
    assert!(feed(&mut w, vec![vec![det(1, 300, 300)], vec![det(1, 300, 290)]]).is_empty());
    let events = feed(&mut w, vec![vec![det(1, 300, 279)]]);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Entry);
}

#[test]
fn leave_and_reenter_compares_with_last_inside_position() {
    let mut w = worker(EntryDirection::TopToBottom, 10);
    let events = feed(
        &mut w,
        vec![
            vec![det(4, 300, 200)],
            // far outside the ROI, way below the baseline
            vec![det(4, 700, 600)],
            vec![det(4, 700, 650)],
            // back inside, only 5 below the last inside position
            vec![det(4, 300, 205)],
        ],
    );
    assert!(events.is_empty());
    assert_eq!(w.tracks().get(1).unwrap().last_position, Some(205));
}

#[test]
fn track_outside_roi_is_never_classified() {
    let mut w = worker(EntryDirection::LeftToRight, 10);
    let frames = (0..50).map(|i| vec![det(77, 600 + i * 40, 20)]).collect();
    assert!(feed(&mut w, frames).is_empty());
    let t = w.tracks().get(1).unwrap();
    assert_eq!(t.last_position, None);
    assert_eq!(t.state, TrackState::Unclassified);
}

#[test]
fn each_track_is_classified_at_most_once() {
    let mut w = worker(EntryDirection::TopToBottom, 10);
    let mut frames = Vec::new();
    // zig-zag far beyond the threshold many times
    for i in 0..40 {
        let y = if i % 2 == 0 { 100 } else { 400 };
        frames.push(vec![det(3, 300, y)]);
    }
    let events = feed(&mut w, frames);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Entry);
    assert_eq!(w.tracks().get(1).unwrap().state, TrackState::Entered);
}

#[test]
fn counters_match_events_and_track_states() {
    let mut w = worker(EntryDirection::RightToLeft, 10);
    let mut frames = Vec::new();
    for step in 0..6 {
        let mut dets = Vec::new();
        for raw in 0..8_i64 {
            // even raw ids drift left (entry), odd ones right (exit), raw 7 stays still
            let dx = if raw == 7 { 0 } else if raw % 2 == 0 { -12 } else { 12 };
            dets.push(det(raw * 1000 + 17, 300 + dx * step, 60 + raw * 45));
        }
        frames.push(dets);
    }
    let events = feed(&mut w, frames);
    let c = w.counters();
    assert_eq!(c.total() as usize, events.len());
    assert_eq!(c.entries as usize, w.tracks().count_in(TrackState::Entered));
    assert_eq!(c.exits as usize, w.tracks().count_in(TrackState::Exited));
    assert_eq!((c.entries, c.exits), (4, 3));

    // running totals on events are monotone and end at the counters
    let last = events.last().unwrap();
    assert_eq!((last.entry_count, last.exit_count), (c.entries, c.exits));
    for pair in events.windows(2) {
        assert!(pair[1].entry_count >= pair[0].entry_count);
        assert!(pair[1].exit_count >= pair[0].exit_count);
    }
}

#[test]
fn display_ids_follow_first_sighting() {
    let mut w = worker(EntryDirection::TopToBottom, 10);
    feed(&mut w, vec![vec![det(900, 300, 100), det(15, 700, 700)], vec![det(42, 300, 300), det(900, 300, 100)]]);
    assert_eq!(w.display_id(900), Some(1));
    assert_eq!(w.display_id(15), Some(2));
    assert_eq!(w.display_id(42), Some(3));
}

#[derive(Default)]
struct Collect(Mutex<Vec<CrossingEvent>>);

impl EventSink for Collect {
    fn emit(&self, ev: CrossingEvent) {
        self.0.lock().unwrap().push(ev);
    }
}

#[tokio::test]
async fn replays_a_detection_file() {
    let path = std::env::temp_dir().join(format!("tally-replay-{}.jsonl", std::process::id()));
    let lines = [
        r#"{"detections":[{"track_id":11,"bbox":[280,80,320,120],"class":"car"}]}"#,
        "not a frame",
        "",
        r#"{"detections":[{"track_id":11,"bbox":[280,100,320,140],"class":"car"},{"bbox":[0,0,1,1],"class":"car"}]}"#,
        r#"{"detections":[{"track_id":11,"bbox":[280,200,320,240],"class":"car"}]}"#,
    ];
    std::fs::write(&path, lines.join("\n")).unwrap();

    let source = FrameSource::file(path.to_str().unwrap()).await.unwrap();
    let sink = Collect::default();
    let status = Arc::new(Mutex::new(CameraStatus::default()));
    let (_tx, rx) = tokio::sync::watch::channel(false);

    let counters = run_camera(worker(EntryDirection::TopToBottom, 10), source, &sink, status.clone(), rx)
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(counters.entries, 1);
    let events = sink.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].track_id, 1);

    let st = status.lock().unwrap();
    assert!(st.finished);
    assert_eq!(st.frames, 3);
    assert_eq!(st.counters, counters);
}

#[tokio::test]
async fn stops_on_shutdown_signal() {
    let path = std::env::temp_dir().join(format!("tally-shutdown-{}.jsonl", std::process::id()));
    std::fs::write(&path, "{}\n{}\n").unwrap();
    let source = FrameSource::file(path.to_str().unwrap()).await.unwrap();
    let status = Arc::new(Mutex::new(CameraStatus::default()));
    let (tx, rx) = tokio::sync::watch::channel(false);
    tx.send(true).unwrap();

    let counters = run_camera(worker(EntryDirection::TopToBottom, 10), source, &tally_proto::NullSink, status.clone(), rx)
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(counters.total(), 0);
    let st = status.lock().unwrap();
    assert!(st.finished);
    assert_eq!(st.frames, 0);
}

#[tokio::test]
async fn garbled_line_is_skipped() {
    let path = std::env::temp_dir().join(format!("tally-garbled-{}.jsonl", std::process::id()));
    let mut body = Vec::new();
    body.extend_from_slice(br#"{"detections":[{"track_id":11,"bbox":[280,80,320,120],"class":"car"}]}"#);
    body.extend_from_slice(b"\n\xff\xfe garbage\n");
    body.extend_from_slice(br#"{"detections":[{"track_id":11,"bbox":[280,120,320,160],"class":"car"}]}"#);
    body.push(b'\n');
    std::fs::write(&path, body).unwrap();

    let source = FrameSource::file(path.to_str().unwrap()).await.unwrap();
    let status = Arc::new(Mutex::new(CameraStatus::default()));
    let (_tx, rx) = tokio::sync::watch::channel(false);

    let counters = run_camera(worker(EntryDirection::TopToBottom, 10), source, &tally_proto::NullSink, status.clone(), rx)
        .await
        .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(counters.entries, 1);
    let st = status.lock().unwrap();
    assert_eq!(st.frames, 2);
    assert_eq!(st.ids, 1);
}

#[tokio::test]
async fn detector_process_output_is_counted() {
    let args = vec![
        "-c".to_string(),
        r#"printf '%s\n' "$0" "$1""#.to_string(),
        r#"{"detections":[{"track_id":4,"bbox":[280,300,320,340],"class":"car"}]}"#.to_string(),
        r#"{"detections":[{"track_id":4,"bbox":[280,260,320,300],"class":"car"}]}"#.to_string(),
    ];
    let source = FrameSource::command("sh", &args).unwrap();
    let sink = Collect::default();
    let status = Arc::new(Mutex::new(CameraStatus::default()));
    let (_tx, rx) = tokio::sync::watch::channel(false);

    let counters = run_camera(worker(EntryDirection::TopToBottom, 10), source, &sink, status.clone(), rx)
        .await
        .unwrap();

    assert_eq!((counters.entries, counters.exits), (0, 1));
    let events = sink.0.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].direction, Direction::Exit);
    assert_eq!(events[0].track_id, 1);
    let st = status.lock().unwrap();
    assert!(st.finished);
    assert_eq!(st.frames, 2);
}

#[tokio::test]
async fn missing_detector_program_fails() {
    assert!(FrameSource::command("/nonexistent/detector", &[]).is_err());
}

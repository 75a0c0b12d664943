use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tally_proto::CounterSnapshot;
use tally_sink::{doctor as sink_doctor, EventSender, SinkConfig};
use tally_vision::doctor as vision_doctor;
use tally_vision::runner::{run_camera, SharedStatus};
use tally_vision::source::{FrameSource, SourceConfig};
use tally_vision::{CameraConfig, CameraWorker};

#[derive(Debug, Parser)]
#[command(name = "tally", version, about = "tally - per-camera vehicle entry/exit counter")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate cameras and sink settings without running anything.
    Doctor,
    /// Count on every configured camera until the streams end or Ctrl-C.
    Run,
    /// Run one camera against a recorded detection file and print its totals.
    Replay {
        #[arg(long)]
        camera: String,
        #[arg(long)]
        input: String,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    #[serde(default)]
    sink: SinkConfig,
    #[serde(default)]
    report: ReportCfg,
    cameras: Vec<CameraConfig>,
}

#[derive(Debug, serde::Deserialize)]
struct ReportCfg {
    /// Seconds between counter reports; 0 turns them off.
    #[serde(default = "default_report_interval")]
    interval_s: u64,
}

impl Default for ReportCfg {
    fn default() -> Self {
        Self { interval_s: default_report_interval() }
    }
}

fn default_report_interval() -> u64 {
    30
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Run => run(&cfg).await?,
        Command::Replay { camera, input } => replay(&cfg, &camera, &input).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");
    vision_doctor::check_unique_ids(&cfg.cameras)?;
    sink_doctor::check_sink(&cfg.sink)?;
    let failed = vision_doctor::check_cameras(&cfg.cameras);
    anyhow::ensure!(failed == 0, "{} of {} cameras failed checks", failed, cfg.cameras.len());
    info!("doctor: OK");
    Ok(())
}

async fn run(cfg: &Config) -> Result<()> {
    vision_doctor::check_unique_ids(&cfg.cameras)?;
    info!("run: starting {} cameras", cfg.cameras.len());

    let (events, sink) = tally_sink::channel(&cfg.sink);
    let sink_task = tokio::spawn(sink.run());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("run: interrupt received, stopping cameras");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                warn!("run: no interrupt handler ({}), stop by ending the streams", e);
                // dropping the sender would read as shutdown to the workers
                std::future::pending::<()>().await;
                drop(shutdown_tx);
            }
        }
    });

    let mut statuses = Vec::new();
    let mut handles = Vec::new();
    for cam in &cfg.cameras {
        let status = SharedStatus::default();
        statuses.push((cam.id.clone(), status.clone()));

        let cam = cam.clone();
        let events = events.clone();
        let rx = shutdown_rx.clone();
        let id = cam.id.clone();
        handles.push((id, tokio::spawn(async move { start_camera(&cam, None, &events, status, rx).await })));
    }
    // Workers hold the remaining senders; the sink ends once they are all done.
    drop(events);

    let reporter = (cfg.report.interval_s > 0)
        .then(|| tokio::spawn(report_loop(statuses.clone(), Duration::from_secs(cfg.report.interval_s))));

    let mut totals = CounterSnapshot::default();
    for (id, h) in handles {
        match h.await {
            Ok(Ok(c)) => {
                totals.entries += c.entries;
                totals.exits += c.exits;
            }
            Ok(Err(e)) => error!("camera {}: {:#}", id, e),
            Err(e) => error!("camera {}: worker task failed: {}", id, e),
        }
    }
    if let Some(r) = reporter {
        r.abort();
    }
    log_statuses(&statuses);

    let stats = sink_task.await.context("sink task")?;
    info!(
        "run: done (entry={}, exit={}, events delivered={}, dropped={})",
        totals.entries, totals.exits, stats.delivered, stats.dropped
    );
    Ok(())
}

async fn replay(cfg: &Config, camera: &str, input: &str) -> Result<()> {
    let cam = cfg
        .cameras
        .iter()
        .find(|c| c.id == camera)
        .with_context(|| format!("no camera with id {}", camera))?;
    let source = SourceConfig::File { path: input.to_string() };

    let (events, sink) = tally_sink::channel(&cfg.sink);
    let sink_task = tokio::spawn(sink.run());
    // Keep the sender alive so the replay only ends at end of file.
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let status = SharedStatus::default();

    let counters = start_camera(cam, Some(&source), &events, status.clone(), shutdown_rx).await?;
    drop(events);
    let stats = sink_task.await.context("sink task")?;

    let frames = status.lock().map(|s| s.frames).unwrap_or_default();
    println!("camera={} frames={}", cam.id, frames);
    println!("entry={} exit={}", counters.entries, counters.exits);
    println!("events delivered={} dropped={}", stats.delivered, stats.dropped);
    Ok(())
}

async fn start_camera(
    cam: &CameraConfig,
    source_override: Option<&SourceConfig>,
    events: &EventSender,
    status: SharedStatus,
    shutdown: watch::Receiver<bool>,
) -> Result<CounterSnapshot> {
    let settings = cam.validate().with_context(|| format!("camera {}: invalid config", cam.id))?;
    let source_cfg = source_override.unwrap_or(&cam.source);
    let source = FrameSource::open(source_cfg)
        .await
        .with_context(|| format!("camera {}: open frame source", cam.id))?;
    run_camera(CameraWorker::new(settings), source, events, status, shutdown).await
}

async fn report_loop(statuses: Vec<(String, SharedStatus)>, every: Duration) {
    let mut tick = tokio::time::interval(every);
    tick.tick().await;
    loop {
        tick.tick().await;
        log_statuses(&statuses);
    }
}

fn log_statuses(statuses: &[(String, SharedStatus)]) {
    for (id, status) in statuses {
        let Ok(st) = status.lock() else {
            warn!("status: camera {} unavailable", id);
            continue;
        };
        info!(
            "status: camera {} frames={} tracks={} ids={} entry={} exit={}{}",
            id,
            st.frames,
            st.tracks,
            st.ids,
            st.counters.entries,
            st.counters.exits,
            if st.finished { " (stopped)" } else { "" }
        );
    }
}

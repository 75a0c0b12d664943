use anyhow::{Context, Result};
use serde::Deserialize;
use std::process::Stdio;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, warn};

use crate::{Frame, RawDetection};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SourceConfig {
    /// Replay of recorded detections, one JSON frame per line.
    File { path: String },
    /// External detect-and-track process writing JSON frames to stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

pub enum FrameSource {
    File(BufReader<File>),
    Command { child: Child, reader: BufReader<ChildStdout> },
}

impl FrameSource {
    pub async fn open(cfg: &SourceConfig) -> Result<Self> {
        match cfg {
            SourceConfig::File { path } => Self::file(path).await,
            SourceConfig::Command { program, args } => Self::command(program, args),
        }
    }

    pub async fn file(path: &str) -> Result<Self> {
        let f = File::open(path).await.with_context(|| format!("open detection file {}", path))?;
        Ok(Self::File(BufReader::new(f)))
    }

    pub fn command(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn detector {}", program))?;
        let stdout = child.stdout.take().context("detector stdout not captured")?;
        debug!("source: spawned {} (pid {:?})", program, child.id());
        Ok(Self::Command { child, reader: BufReader::new(stdout) })
    }

    /// Next decodable frame; `None` once the stream has ended.
    ///
    /// Lines are read as raw bytes, so invalid UTF-8 only costs that line.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = match self {
                FrameSource::File(reader) => reader.read_until(b'\n', &mut buf).await.context("read detection file")?,
                FrameSource::Command { reader, .. } => {
                    reader.read_until(b'\n', &mut buf).await.context("read detector output")?
                }
            };
            if n == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&buf);
            match parse_frame_line(&line) {
                Ok(Some(frame)) => return Ok(Some(frame)),
                Ok(None) => continue,
                Err(e) => warn!("source: dropping unreadable frame: {:#}", e),
            }
        }
    }

    /// Stops the detector process, if any.
    pub async fn close(self) {
        if let FrameSource::Command { mut child, .. } = self {
            if let Err(e) = child.kill().await {
                debug!("source: detector already gone: {}", e);
            }
        }
    }
}

#[derive(Deserialize)]
struct LooseFrame {
    #[serde(default)]
    detections: Vec<serde_json::Value>,
}

/// Parses one JSON frame line. Blank lines yield `None`; individual
/// detections that do not decode are dropped so the rest of the frame survives.
pub fn parse_frame_line(line: &str) -> Result<Option<Frame>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let loose: LooseFrame = serde_json::from_str(line).context("parse frame json")?;
    let mut detections = Vec::with_capacity(loose.detections.len());
    for v in loose.detections {
        match serde_json::from_value::<RawDetection>(v) {
            Ok(d) => detections.push(d),
            Err(e) => debug!("source: bad detection dropped: {}", e),
        }
    }
    Ok(Some(Frame { detections }))
}

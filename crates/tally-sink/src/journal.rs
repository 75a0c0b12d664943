use anyhow::{Context, Result};
use std::path::PathBuf;
use tally_proto::CrossingEvent;
use tokio::{fs, io::AsyncWriteExt};
use tracing::info;

/// Append-only JSON-lines event file. When the next line would push it past
/// `max_bytes` the file is rotated to `<path>.1`, replacing the previous one.
pub(crate) struct Journal {
    path: PathBuf,
    max_bytes: u64,
    written: u64,
    file: Option<fs::File>,
}

impl Journal {
    pub(crate) fn new(path: &str, max_bytes: u64) -> Self {
        Self { path: PathBuf::from(path), max_bytes, written: 0, file: None }
    }

    pub(crate) async fn append(&mut self, ev: &CrossingEvent) -> Result<()> {
        let mut line = serde_json::to_vec(ev)?;
        line.push(b'\n');

        if self.file.is_none() {
            self.open().await?;
        }
        if self.written > 0 && self.written.saturating_add(line.len() as u64) > self.max_bytes {
            self.rotate().await?;
        }

        let f = self.file.as_mut().context("journal not open")?;
        f.write_all(&line).await.context("write journal")?;
        f.flush().await?;
        self.written += line.len() as u64;
        Ok(())
    }

    async fn open(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("open journal {}", self.path.display()))?;
        self.written = f.metadata().await?.len();
        self.file = Some(f);
        Ok(())
    }

    async fn rotate(&mut self) -> Result<()> {
        self.file = None;
        let mut rotated = self.path.clone().into_os_string();
        rotated.push(".1");
        fs::rename(&self.path, &rotated).await.context("rotate journal")?;
        info!("sink: journal rotated after {} bytes", self.written);
        self.written = 0;
        self.open().await
    }
}

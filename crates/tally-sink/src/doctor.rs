use anyhow::Result;
use std::path::Path;

use crate::SinkConfig;

const MAX_JOURNAL_MB: u64 = 1 << 20;

pub fn check_sink(cfg: &SinkConfig) -> Result<()> {
    anyhow::ensure!(cfg.channel_capacity >= 1, "sink.channel_capacity must be >= 1");
    if let Some(path) = &cfg.journal_path {
        let p = Path::new(path);
        anyhow::ensure!(!p.is_dir(), "sink.journal_path is a directory: {}", path);
        if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
            if dir.exists() {
                anyhow::ensure!(dir.is_dir(), "sink.journal_path parent is not a dir: {}", dir.display());
            }
        }
        anyhow::ensure!(cfg.journal_max_mb >= 1, "sink.journal_max_mb too small; set >= 1MB");
        anyhow::ensure!(
            cfg.journal_max_mb <= MAX_JOURNAL_MB,
            "sink.journal_max_mb too large; set <= {}MB",
            MAX_JOURNAL_MB
        );
    }
    Ok(())
}

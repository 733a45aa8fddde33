//! Append-only journal sink
//!
//! One self-contained JSON record per line. Appends are serialized by a
//! mutex so concurrent handlers never interleave partial lines.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::ConnectionEvent;

pub struct Journal {
    file: Mutex<File>,
}

impl Journal {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("cannot open journal at {}", path.display()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub async fn append(&self, event: &ConnectionEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event).context("cannot serialize event")?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.context("journal write failed")?;
        file.flush().await.context("journal flush failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoInfo;
    use tempfile::TempDir;

    fn sample_event(data: &str, suspicious: bool) -> ConnectionEvent {
        ConnectionEvent::new(
            "203.0.113.7:40022".parse().unwrap(),
            data.to_string(),
            GeoInfo::unknown(),
            suspicious,
        )
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let journal = Journal::open(&path).await.unwrap();

        journal.append(&sample_event("first", false)).await.unwrap();
        journal.append(&sample_event("second", true)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let restored: ConnectionEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(restored.ip, "203.0.113.7");
        assert_eq!(restored.port, 40022);
        assert_eq!(restored.data, "second");
        assert!(restored.suspicious);
    }

    #[tokio::test]
    async fn reopening_keeps_existing_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");

        let journal = Journal::open(&path).await.unwrap();
        journal.append(&sample_event("old", false)).await.unwrap();
        drop(journal);

        let journal = Journal::open(&path).await.unwrap();
        journal.append(&sample_event("new", false)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}

//! Newline-delimited JSON execution logs.
//!
//! Each line holds one [`RawEvent`]. Reading normalizes events and skips
//! lines that cannot enter the fold, so one bad record never hides the rest
//! of the log.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::warn;

use crate::domain::{Event, RawEvent};

/// A JSONL event log on disk
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

/// Events read from one position of the log onward
#[derive(Debug, Default)]
pub struct LogChunk {
    /// Normalized events in log order
    pub events: Vec<Event>,

    /// Lines that were skipped as malformed
    pub dropped: usize,

    /// Offset to continue from; never points into a partial line
    pub next_offset: u64,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a raw event as one line
    pub async fn append(&self, event: &RawEvent) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open event log: {}", self.path.display()))?;

        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        file.write_all(format!("{}\n", json).as_bytes())
            .await
            .context("Failed to write event")?;
        file.flush().await.context("Failed to flush event log")?;

        Ok(())
    }

    /// Read and normalize every event in the log
    pub async fn replay(&self) -> Result<Vec<Event>> {
        Ok(self.read_from(0).await?.events)
    }

    /// Read complete lines starting at `offset`.
    ///
    /// A trailing line without a newline is left for the next call. If the
    /// file has shrunk below `offset` it was truncated or rotated, and reading
    /// restarts from the beginning.
    pub async fn read_from(&self, offset: u64) -> Result<LogChunk> {
        if !self.path.exists() {
            return Ok(LogChunk {
                next_offset: offset,
                ..Default::default()
            });
        }

        let len = fs::metadata(&self.path)
            .await
            .with_context(|| format!("Failed to stat event log: {}", self.path.display()))?
            .len();
        let start = if len < offset {
            warn!(path = %self.path.display(), "Event log shrank, re-reading from the start");
            0
        } else {
            offset
        };

        let mut file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to open event log: {}", self.path.display()))?;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .await
            .with_context(|| format!("Failed to read event log: {}", self.path.display()))?;

        let consumed = buf.iter().rposition(|b| *b == b'\n').map(|i| i + 1).unwrap_or(0);
        let mut chunk = LogChunk {
            next_offset: start + consumed as u64,
            ..Default::default()
        };

        for (line_no, line) in String::from_utf8_lossy(&buf[..consumed]).lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Ok(event) => chunk.events.push(event),
                Err(e) => {
                    warn!(line = line_no + 1, "Skipping event log line: {:#}", e);
                    chunk.dropped += 1;
                }
            }
        }

        Ok(chunk)
    }
}

fn parse_line(line: &str) -> Result<Event> {
    let raw: RawEvent = serde_json::from_str(line).context("not a valid event record")?;
    Ok(Event::normalize(raw)?)
}

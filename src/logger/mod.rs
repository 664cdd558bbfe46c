//! Append-only session logging
//!
//! One JSON-lines file per room, opened with a `session_created` record and
//! appended by the room's single-dispatch context, so no locking is needed.
//! The log is the authoritative reconstruction of a session: every score
//! delta and threat outcome can be replayed from it (see [`replay`]).

mod replay;

pub use replay::{replay_session, ReplaySummary};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One action record in the session log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp_iso: String,
    pub elapsed_time_s: f64,
    pub room: String,
    pub username: String,
    pub role: String,
    pub action: String,
    pub details: Value,
    pub phase: String,
    pub score: i32,
}

/// Append-only structured event log for one room.
pub struct SessionLogger {
    room: String,
    path: PathBuf,
    writer: BufWriter<File>,
    opened_at: Instant,
}

impl SessionLogger {
    /// Create the log file for a room, writing the opening record.
    pub fn create(log_dir: &Path, room: &str) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("creating log directory {}", log_dir.display()))?;

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let safe_room: String = room
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        // Room ids can be reused immediately after teardown; the suffix keeps
        // every session's file distinct.
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let path = log_dir.join(format!(
            "session_{}_{}_{}.log",
            safe_room,
            stamp,
            &suffix[..8]
        ));

        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("creating session log {}", path.display()))?;

        let mut logger = Self {
            room: room.to_string(),
            path,
            writer: BufWriter::new(file),
            opened_at: Instant::now(),
        };

        let opening = serde_json::json!({
            "event": "session_created",
            "timestamp": Utc::now().to_rfc3339(),
            "room": room,
            "log_file": logger.path.display().to_string(),
        });
        logger.write_line(&opening)?;

        tracing::info!(room = %room, path = %logger.path.display(), "session log created");
        Ok(logger)
    }

    /// Append one action record. An I/O failure here is fatal for the room.
    pub fn log(
        &mut self,
        username: &str,
        role: &str,
        action: &str,
        details: Value,
        phase: &str,
        score: i32,
    ) -> Result<()> {
        let record = LogRecord {
            timestamp_iso: Utc::now().to_rfc3339(),
            elapsed_time_s: self.opened_at.elapsed().as_secs_f64(),
            room: self.room.clone(),
            username: username.to_string(),
            role: role.to_string(),
            action: action.to_string(),
            details,
            phase: phase.to_string(),
            score,
        };
        let line = serde_json::to_value(&record).context("serializing log record")?;
        self.write_line(&line)
    }

    fn write_line(&mut self, value: &Value) -> Result<()> {
        serde_json::to_writer(&mut self.writer, value).context("writing log record")?;
        self.writer.write_all(b"\n").context("writing log newline")?;
        self.writer.flush().context("flushing session log")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

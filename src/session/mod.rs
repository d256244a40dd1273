//! Session logging.
//!
//! Completed work sessions are appended to a JSON-lines file, one
//! `SessionRecord` per line. The logger is only called from the event
//! dispatcher, never from inside a timer transition.

mod stats;

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

use crate::types::{SessionRecord, TimerMode};

pub use stats::{SessionStats, DAILY_WINDOW_DAYS, STREAK_GAP_MINUTES};

/// Session log errors.
#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("セッション記録の書き込みに失敗しました: {0}")]
    Io(#[from] std::io::Error),

    #[error("セッション記録の変換に失敗しました: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Receives session lifecycle events.
pub trait SessionLogger: Send + Sync {
    /// Called when a signed-in user starts a session.
    fn log_session_start(&self, mode: TimerMode, started_at: DateTime<Utc>)
        -> Result<(), SessionLogError>;

    /// Called exactly once per completed work session.
    fn log_session_completed(&self, record: &SessionRecord) -> Result<(), SessionLogError>;
}

// ============================================================================
// JsonlSessionLog
// ============================================================================

/// Append-only JSON-lines session log.
#[derive(Debug)]
pub struct JsonlSessionLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlSessionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every record in the log. Malformed lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_all(&self) -> Result<Vec<SessionRecord>, SessionLogError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SessionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping malformed line {} in {}: {}",
                    index + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(records)
    }
}

impl SessionLogger for JsonlSessionLog {
    fn log_session_start(
        &self,
        mode: TimerMode,
        started_at: DateTime<Utc>,
    ) -> Result<(), SessionLogError> {
        info!("Session started: {} at {}", mode.as_str(), started_at.to_rfc3339());
        Ok(())
    }

    fn log_session_completed(&self, record: &SessionRecord) -> Result<(), SessionLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        info!(
            "Session logged: {}s, feedback {:?}",
            record.duration_seconds, record.feedback
        );
        Ok(())
    }
}

// ============================================================================
// MemorySessionLog
// ============================================================================

/// In-memory logger for tests.
#[derive(Debug, Default)]
pub struct MemorySessionLog {
    starts: Mutex<Vec<(TimerMode, DateTime<Utc>)>>,
    records: Mutex<Vec<SessionRecord>>,
}

impl MemorySessionLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn starts(&self) -> Vec<(TimerMode, DateTime<Utc>)> {
        self.starts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn records(&self) -> Vec<SessionRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SessionLogger for MemorySessionLog {
    fn log_session_start(
        &self,
        mode: TimerMode,
        started_at: DateTime<Utc>,
    ) -> Result<(), SessionLogError> {
        self.starts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((mode, started_at));
        Ok(())
    }

    fn log_session_completed(&self, record: &SessionRecord) -> Result<(), SessionLogError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record.clone());
        Ok(())
    }
}

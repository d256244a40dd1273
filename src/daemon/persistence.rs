//! Snapshot storage for suspend/resume.
//!
//! A single `TimerSnapshot` is kept under a well-known key (a JSON file in
//! the data directory) and overwritten wholesale on every suspend.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::types::TimerSnapshot;

/// Snapshots older than this are discarded on resume.
pub const STALE_SNAPSHOT_SECS: i64 = 3600;

/// Snapshot storage errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("スナップショットの読み書きに失敗しました: {0}")]
    Io(#[from] std::io::Error),

    #[error("スナップショットの形式が不正です: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("スナップショットの保存に失敗しました: {0}")]
    Persist(String),
}

/// Durable storage for one timer snapshot.
pub trait SnapshotStore: Send {
    /// Reads the stored snapshot, if any.
    fn load(&self) -> Result<Option<TimerSnapshot>, PersistenceError>;

    /// Replaces the stored snapshot.
    fn save(&self, snapshot: &TimerSnapshot) -> Result<(), PersistenceError>;

    /// Removes the stored snapshot. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), PersistenceError>;
}

// ============================================================================
// FileSnapshotStore
// ============================================================================

/// Stores the snapshot as a JSON file, written atomically.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<TimerSnapshot>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot = serde_json::from_str(&content)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<(), PersistenceError> {
        write_json_atomic(&self.path, snapshot)?;
        debug!("Snapshot saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Serializes `value` and replaces `path` through a temp file in the same
/// directory, so readers never see a partial write.
pub(crate) fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let json = serde_json::to_string_pretty(value)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path)
        .map_err(|e| PersistenceError::Persist(e.to_string()))?;
    Ok(())
}

// ============================================================================
// MemorySnapshotStore
// ============================================================================

/// In-memory store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    slot: Arc<Mutex<Option<TimerSnapshot>>>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stored(&self) -> Option<TimerSnapshot> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<TimerSnapshot>, PersistenceError> {
        Ok(self.stored())
    }

    fn save(&self, snapshot: &TimerSnapshot) -> Result<(), PersistenceError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

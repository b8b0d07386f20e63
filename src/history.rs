//! History store
//!
//! Append-only ordered log of completed queries, persisted as a single JSON
//! file. A `tokio::sync::Mutex` serializes appends and clears; every persist
//! writes a sibling temp file first and renames it into place, so a reader
//! never observes a torn entry.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::model::HistoryEntry;

/// Oldest entries are dropped past this count
const MAX_ENTRIES: usize = 100;

/// File-backed append-only query log
pub struct HistoryStore {
    path: PathBuf,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryStore {
    /// Open (or create) the log at `path`, loading any existing entries
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read(&path).map_err(|e| StorageError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            serde_json::from_slice(&raw).map_err(|e| StorageError::ReadFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            Vec::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Append one entry, in arrival order
    pub async fn append(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.push(entry);
        if entries.len() > MAX_ENTRIES {
            let excess = entries.len() - MAX_ENTRIES;
            entries.drain(..excess);
        }
        persist(&self.path, &entries)?;
        debug!(count = entries.len(), "history appended");
        Ok(())
    }

    /// All entries, oldest first
    pub async fn list(&self) -> Vec<HistoryEntry> {
        self.entries.lock().await.clone()
    }

    /// Atomically remove every entry
    pub async fn clear(&self) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        persist(&self.path, &entries)?;
        Ok(())
    }
}

/// Write the whole log through a temp file and rename it into place
fn persist(path: &Path, entries: &[HistoryEntry]) -> Result<(), StorageError> {
    let write_failed = |message: String| StorageError::WriteFailed {
        path: path.display().to_string(),
        message,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
    }

    let raw = serde_json::to_vec_pretty(entries).map_err(|e| write_failed(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw).map_err(|e| write_failed(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| write_failed(e.to_string()))?;
    Ok(())
}

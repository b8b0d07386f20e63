//! Report generator
//!
//! Snapshots an aggregated result plus analyst notes into a retrievable JSON
//! artifact. Packaging is deterministic: the payload a fetch returns is the
//! payload that was generated, byte for byte (serde_json's map ordering is
//! stable, so re-serializing the stored value reproduces the original bytes).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReportError;
use crate::model::Report;

/// A report artifact as persisted on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReport {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub notes: String,
    pub payload: serde_json::Value,
}

/// Directory-backed report artifact store
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Package a result snapshot into a new artifact
    ///
    /// The input is not mutated; the returned locator retrieves the artifact
    /// until it is explicitly deleted.
    pub fn generate(
        &self,
        title: &str,
        payload: &serde_json::Value,
        notes: &str,
    ) -> Result<Report, ReportError> {
        let id = Uuid::new_v4();
        let locator = id.simple().to_string();
        let created_at = Utc::now();

        let stored = StoredReport {
            id,
            title: title.to_string(),
            created_at,
            notes: notes.to_string(),
            payload: payload.clone(),
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| ReportError::WriteFailed(e.to_string()))?;
        let raw =
            serde_json::to_vec_pretty(&stored).map_err(|e| ReportError::WriteFailed(e.to_string()))?;
        std::fs::write(self.artifact_path(&locator), raw)
            .map_err(|e| ReportError::WriteFailed(e.to_string()))?;

        Ok(Report {
            id,
            title: title.to_string(),
            created_at,
            notes: notes.to_string(),
            locator,
        })
    }

    /// Retrieve an artifact by its locator
    pub fn fetch(&self, locator: &str) -> Result<StoredReport, ReportError> {
        let locator = validate_locator(locator)?;
        let path = self.artifact_path(&locator);
        if !path.exists() {
            return Err(ReportError::NotFound(locator));
        }

        let raw = std::fs::read(&path).map_err(|e| ReportError::ReadFailed(e.to_string()))?;
        serde_json::from_slice(&raw).map_err(|e| ReportError::ReadFailed(e.to_string()))
    }

    /// Delete an artifact; missing artifacts are reported as not found
    pub fn delete(&self, locator: &str) -> Result<(), ReportError> {
        let locator = validate_locator(locator)?;
        let path = self.artifact_path(&locator);
        if !path.exists() {
            return Err(ReportError::NotFound(locator));
        }
        std::fs::remove_file(&path).map_err(|e| ReportError::WriteFailed(e.to_string()))
    }

    fn artifact_path(&self, locator: &str) -> PathBuf {
        Path::new(&self.dir).join(format!("{locator}.json"))
    }
}

/// Locators are simple-format UUIDs; anything else (notably path fragments)
/// is rejected before touching the filesystem
fn validate_locator(locator: &str) -> Result<String, ReportError> {
    Uuid::try_parse(locator)
        .map(|u| u.simple().to_string())
        .map_err(|_| ReportError::InvalidLocator(locator.to_string()))
}

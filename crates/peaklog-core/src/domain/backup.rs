//! Backup document framing
//!
//! A backup is a single JSON document holding both collections:
//!
//! ```json
//! { "mountains": [...], "gpxTracks": [...], "version": 1 }
//! ```
//!
//! Importing validates the framing before anything touches the local
//! collections.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::mountain::Mountain;
use super::track::GpxTrack;

/// Current backup format version
pub const BACKUP_VERSION: u32 = 1;

/// Both collections, as exported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppData {
    pub mountains: Vec<Mountain>,
    pub gpx_tracks: Vec<GpxTrack>,
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    BACKUP_VERSION
}

impl AppData {
    pub fn new(mountains: Vec<Mountain>, gpx_tracks: Vec<GpxTrack>) -> Self {
        Self {
            mountains,
            gpx_tracks,
            version: BACKUP_VERSION,
        }
    }

    /// Serializes the document (pretty-printed, two-space indent)
    pub fn to_json(&self) -> Result<String, DomainError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| DomainError::ValidationFailed(format!("serialize backup: {e}")))
    }

    /// Parses and validates a backup document
    ///
    /// # Errors
    /// Returns `DomainError::MalformedImport` if the payload is not JSON,
    /// lacks either record array, or holds records that do not deserialize.
    pub fn from_json(payload: &str) -> Result<Self, DomainError> {
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| DomainError::MalformedImport(format!("not JSON: {e}")))?;

        for field in ["mountains", "gpxTracks"] {
            if !value.get(field).is_some_and(|v| v.is_array()) {
                return Err(DomainError::MalformedImport(format!(
                    "missing '{field}' array"
                )));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| DomainError::MalformedImport(format!("invalid record: {e}")))
    }

    /// Conventional file name for a backup taken on `date`
    pub fn file_name(date: NaiveDate) -> String {
        format!("mountain-tracker-backup-{}.json", date.format("%Y-%m-%d"))
    }
}

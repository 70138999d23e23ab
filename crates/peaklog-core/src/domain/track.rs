//! GPX track domain entity
//!
//! Tracks are immutable once created: their logical clock is `createdAt`.
//! Parsing the GPX document and computing distance or elevation gain happens
//! outside this crate; a [`TrackDraft`] carries the results in.

use serde::{Deserialize, Serialize};

use super::clock::LastModified;
use super::newtypes::RecordId;
use super::record::{CollectionKind, SyncableRecord};

/// Display palette, assigned round-robin by the number of existing tracks
pub const TRACK_COLORS: [&str; 10] = [
    "#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6", "#1abc9c", "#e67e22", "#34495e",
    "#16a085", "#c0392b",
];

/// Output of the GPX parser for one uploaded file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackDraft {
    pub name: String,
    pub file_name: String,
    /// `[lat, lng]` pairs
    pub coordinates: Vec<[f64; 2]>,
    /// Metres
    pub total_distance: Option<f64>,
    /// Metres
    pub elevation_gain: Option<f64>,
    pub track_date: Option<String>,
}

/// A GPX track record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpxTrack {
    pub id: RecordId,
    pub name: String,
    pub file_name: String,
    pub coordinates: Vec<[f64; 2]>,
    pub total_distance: Option<f64>,
    pub elevation_gain: Option<f64>,
    pub track_date: Option<String>,
    pub color: String,
    pub raw_gpx: String,
    pub mountain_id: Option<RecordId>,
    pub created_at: LastModified,
}

impl GpxTrack {
    /// Creates a track record from parsed GPX data
    ///
    /// `existing_count` is the number of tracks already stored and picks the
    /// display colour.
    pub fn create(
        draft: TrackDraft,
        raw_gpx: impl Into<String>,
        mountain_id: Option<RecordId>,
        existing_count: usize,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            name: draft.name,
            file_name: draft.file_name,
            coordinates: draft.coordinates,
            total_distance: draft.total_distance,
            elevation_gain: draft.elevation_gain,
            track_date: draft.track_date,
            color: TRACK_COLORS[existing_count % TRACK_COLORS.len()].to_string(),
            raw_gpx: raw_gpx.into(),
            mountain_id,
            created_at: LastModified::now(),
        }
    }

    /// Distance in kilometres, if known
    pub fn distance_km(&self) -> Option<f64> {
        self.total_distance.map(|m| m / 1000.0)
    }
}

impl SyncableRecord for GpxTrack {
    const KIND: CollectionKind = CollectionKind::GpxTracks;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn last_modified(&self) -> &LastModified {
        &self.created_at
    }
}

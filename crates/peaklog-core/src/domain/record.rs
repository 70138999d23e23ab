//! The syncable record capability
//!
//! The sync engine is written once against [`SyncableRecord`] and
//! instantiated per record kind. A record only has to expose a stable
//! identity and a last-modified marker; everything else is payload that the
//! reconciliation logic never inspects.

use std::fmt::{self, Debug, Display, Formatter};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::clock::LastModified;
use super::newtypes::RecordId;

/// The collections peaklog keeps, one per record kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Mountains,
    GpxTracks,
}

impl CollectionKind {
    /// Name of the collection in the remote store
    pub fn collection_name(&self) -> &'static str {
        match self {
            CollectionKind::Mountains => "mountains",
            CollectionKind::GpxTracks => "gpxTracks",
        }
    }

    /// Name of the local persistence slot
    pub fn storage_slot(&self) -> &'static str {
        match self {
            CollectionKind::Mountains => "mountain-tracker-mountains",
            CollectionKind::GpxTracks => "mountain-tracker-gpx-tracks",
        }
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.collection_name())
    }
}

/// Semantic key of a record: two records sharing it describe the same
/// real-world entity
///
/// Coordinates are stored in hundredths of a degree so the key is hashable
/// and two positions that round to the same two decimals compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    name: String,
    lat_centi: i64,
    lng_centi: i64,
}

impl DedupKey {
    /// Builds the key from a name and a coordinate pair
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat_centi: round_centi(lat),
            lng_centi: round_centi(lng),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Latitude rounded to two decimals
    pub fn lat(&self) -> f64 {
        self.lat_centi as f64 / 100.0
    }

    /// Longitude rounded to two decimals
    pub fn lng(&self) -> f64 {
        self.lng_centi as f64 / 100.0
    }
}

fn round_centi(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

/// A record that can be reconciled between the local collection and the
/// remote store
pub trait SyncableRecord:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Collection this record kind lives in
    const KIND: CollectionKind;

    /// Stable, client-generated identity
    fn id(&self) -> &RecordId;

    /// Logical clock of the record
    fn last_modified(&self) -> &LastModified;

    /// Semantic key for duplicate detection
    ///
    /// Record kinds without a natural key return `None` and are never
    /// deduplicated.
    fn dedup_key(&self) -> Option<DedupKey> {
        None
    }
}

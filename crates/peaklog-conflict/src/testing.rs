//! Minimal record kinds for unit tests

use peaklog_core::domain::{CollectionKind, DedupKey, LastModified, RecordId, SyncableRecord};
use serde::{Deserialize, Serialize};

/// A keyed record with a free payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: RecordId,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub climbed: bool,
    pub modified: LastModified,
}

impl SyncableRecord for Place {
    const KIND: CollectionKind = CollectionKind::Mountains;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn last_modified(&self) -> &LastModified {
        &self.modified
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::new(self.name.clone(), self.lat, self.lng))
    }
}

/// A record kind without a semantic key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: RecordId,
    pub name: String,
    pub modified: LastModified,
}

impl SyncableRecord for Trace {
    const KIND: CollectionKind = CollectionKind::GpxTracks;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn last_modified(&self) -> &LastModified {
        &self.modified
    }
}

pub fn place(id: &str, modified: &str, climbed: bool) -> Place {
    Place {
        id: RecordId::new(id).unwrap(),
        name: "Fuji".into(),
        lat: 35.36,
        lng: 138.73,
        climbed,
        modified: LastModified::from_raw(modified),
    }
}

pub fn named(id: &str, name: &str, lat: f64, lng: f64, modified: &str) -> Place {
    Place {
        id: RecordId::new(id).unwrap(),
        name: name.into(),
        lat,
        lng,
        climbed: false,
        modified: LastModified::from_raw(modified),
    }
}

pub fn trace(id: &str, modified: &str) -> Trace {
    Trace {
        id: RecordId::new(id).unwrap(),
        name: "Yoshida".into(),
        modified: LastModified::from_raw(modified),
    }
}

pub fn id(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

//! Mountain domain entity
//!
//! A mountain is the point-of-interest record of peaklog: a geocoordinate
//! with a classification, a climbed status and free-text notes. Its logical
//! clock is `updatedAt`; every mutator below advances it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::clock::LastModified;
use super::newtypes::RecordId;
use super::record::{CollectionKind, DedupKey, SyncableRecord};

/// Classification of a mountain
///
/// Serialized with the labels used by the remote store and backup files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MountainCategory {
    /// One of the 100 famous mountains
    #[serde(rename = "百名山")]
    Hyakumeizan,
    /// One of the 200 famous mountains
    #[serde(rename = "二百名山")]
    Nihyakumeizan,
    /// One of the 300 famous mountains
    #[serde(rename = "三百名山")]
    Sanbyakumeizan,
    #[serde(rename = "その他")]
    #[default]
    Other,
}

impl MountainCategory {
    pub const ALL: [MountainCategory; 4] = [
        MountainCategory::Hyakumeizan,
        MountainCategory::Nihyakumeizan,
        MountainCategory::Sanbyakumeizan,
        MountainCategory::Other,
    ];

    /// Stored label of the category
    pub fn label(&self) -> &'static str {
        match self {
            MountainCategory::Hyakumeizan => "百名山",
            MountainCategory::Nihyakumeizan => "二百名山",
            MountainCategory::Sanbyakumeizan => "三百名山",
            MountainCategory::Other => "その他",
        }
    }

    /// Parses either the stored label or an ASCII alias
    /// (`hyakumeizan`, `nihyakumeizan`, `sanbyakumeizan`, `other`)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| {
            c.label() == s || format!("{c:?}").eq_ignore_ascii_case(s)
        })
    }
}

impl std::fmt::Display for MountainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// User-entered fields of a mountain (create or edit)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MountainDraft {
    pub name: String,
    pub elevation: f64,
    pub lat: f64,
    pub lng: f64,
    pub category: MountainCategory,
    pub is_climbed: bool,
    /// Ignored unless `is_climbed` is set
    pub climb_date: Option<String>,
    pub notes: String,
}

/// An entry of a bundled preset list, loaded in bulk on first launch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetMountain {
    pub name: String,
    pub elevation: f64,
    pub lat: f64,
    pub lng: f64,
    pub category: MountainCategory,
    #[serde(default)]
    pub is_climbed: bool,
    #[serde(default)]
    pub climb_date: Option<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub gpx_track_ids: Vec<RecordId>,
}

/// A mountain record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mountain {
    pub id: RecordId,
    pub name: String,
    pub elevation: f64,
    pub lat: f64,
    pub lng: f64,
    pub category: MountainCategory,
    pub is_climbed: bool,
    pub climb_date: Option<String>,
    pub notes: String,
    #[serde(default)]
    pub gpx_track_ids: Vec<RecordId>,
    pub created_at: LastModified,
    pub updated_at: LastModified,
}

impl Mountain {
    /// Creates a new mountain with a fresh identity and clock
    pub fn create(draft: MountainDraft) -> Self {
        let now = LastModified::now();
        let climb_date = climb_date_for(draft.is_climbed, draft.climb_date);
        Self {
            id: RecordId::generate(),
            name: draft.name,
            elevation: draft.elevation,
            lat: draft.lat,
            lng: draft.lng,
            category: draft.category,
            is_climbed: draft.is_climbed,
            climb_date,
            notes: draft.notes,
            gpx_track_ids: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Turns a preset entry into a record with a fresh identity and clock
    pub fn from_preset(preset: PresetMountain) -> Self {
        let now = LastModified::now();
        Self {
            id: RecordId::generate(),
            name: preset.name,
            elevation: preset.elevation,
            lat: preset.lat,
            lng: preset.lng,
            category: preset.category,
            is_climbed: preset.is_climbed,
            climb_date: climb_date_for(preset.is_climbed, preset.climb_date),
            notes: preset.notes,
            gpx_track_ids: preset.gpx_track_ids,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Replaces every user-editable field with the draft's values
    pub fn apply_draft(&mut self, draft: MountainDraft) {
        self.name = draft.name;
        self.elevation = draft.elevation;
        self.lat = draft.lat;
        self.lng = draft.lng;
        self.category = draft.category;
        self.is_climbed = draft.is_climbed;
        self.climb_date = climb_date_for(draft.is_climbed, draft.climb_date);
        self.notes = draft.notes;
        self.touch();
    }

    /// Flips the climbed status
    ///
    /// Becoming climbed records `today` as the climb date; becoming
    /// unclimbed clears it.
    pub fn toggle_climbed(&mut self, today: NaiveDate) {
        self.is_climbed = !self.is_climbed;
        self.climb_date = self
            .is_climbed
            .then(|| today.format("%Y-%m-%d").to_string());
        self.touch();
    }

    /// Links a GPX track to this mountain
    pub fn link_track(&mut self, track_id: RecordId) {
        self.gpx_track_ids.push(track_id);
        self.touch();
    }

    /// Removes a track link, returning true if one was removed
    pub fn unlink_track(&mut self, track_id: &RecordId) -> bool {
        let before = self.gpx_track_ids.len();
        self.gpx_track_ids.retain(|id| id != track_id);
        let removed = self.gpx_track_ids.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Draft holding this mountain's current editable fields
    pub fn to_draft(&self) -> MountainDraft {
        MountainDraft {
            name: self.name.clone(),
            elevation: self.elevation,
            lat: self.lat,
            lng: self.lng,
            category: self.category,
            is_climbed: self.is_climbed,
            climb_date: self.climb_date.clone(),
            notes: self.notes.clone(),
        }
    }

    fn touch(&mut self) {
        self.updated_at = LastModified::advance(&self.updated_at);
    }
}

fn climb_date_for(is_climbed: bool, climb_date: Option<String>) -> Option<String> {
    if is_climbed {
        climb_date.filter(|d| !d.is_empty())
    } else {
        None
    }
}

impl SyncableRecord for Mountain {
    const KIND: CollectionKind = CollectionKind::Mountains;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn last_modified(&self) -> &LastModified {
        &self.updated_at
    }

    fn dedup_key(&self) -> Option<DedupKey> {
        Some(DedupKey::new(self.name.clone(), self.lat, self.lng))
    }
}

//! Domain entities and business logic
//!
//! This module contains the core domain types for peaklog:
//! - Newtypes for record identities and user scopes
//! - The logical clock (`LastModified`) every merge decision depends on
//! - The `SyncableRecord` capability shared by both record kinds
//! - Mountain (point-of-interest) and GPX track records
//! - Mountain list filtering
//! - Backup (export/import) framing
//! - Domain-specific error types

pub mod backup;
pub mod clock;
pub mod errors;
pub mod filter;
pub mod mountain;
pub mod newtypes;
pub mod record;
pub mod track;

// Re-export commonly used types
pub use backup::{AppData, BACKUP_VERSION};
pub use clock::{newer, LastModified};
pub use errors::DomainError;
pub use filter::{ClimbedStatus, MountainFilter};
pub use mountain::{Mountain, MountainCategory, MountainDraft, PresetMountain};
pub use newtypes::{RecordId, UserScope};
pub use record::{CollectionKind, DedupKey, SyncableRecord};
pub use track::{GpxTrack, TrackDraft, TRACK_COLORS};

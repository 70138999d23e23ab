//! Last-writer-wins merge
//!
//! Reconciles the local collection with a remote snapshot one identity at a
//! time. A whole record wins or loses; fields are never combined.

use std::collections::{HashMap, HashSet};

use peaklog_core::domain::{newer, RecordId, SyncableRecord};
use tracing::trace;

/// Result of [`merge`]
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome<R> {
    /// Every identity seen in either input, exactly once
    pub records: Vec<R>,
    /// Remote records whose identity was not present locally
    pub inserted: usize,
    /// Local records replaced by a newer remote copy
    pub replaced: usize,
}

impl<R> MergeOutcome<R> {
    /// True if the merge left the local collection as it was
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.replaced == 0
    }
}

/// Merges `remote` into `local`
///
/// For an identity present on both sides the copy with the greater
/// `lastModified` is kept; equal markers keep the local copy. Local order is
/// preserved and remote-only records are appended in identity order.
pub fn merge<R: SyncableRecord>(local: Vec<R>, remote: &HashMap<RecordId, R>) -> MergeOutcome<R> {
    let mut seen = HashSet::with_capacity(local.len());
    let mut replaced = 0;

    let mut records: Vec<R> = local
        .into_iter()
        .map(|record| {
            seen.insert(record.id().clone());
            match remote.get(record.id()) {
                Some(theirs) if newer(theirs, &record) => {
                    trace!(
                        record_id = %record.id(),
                        local = %record.last_modified(),
                        remote = %theirs.last_modified(),
                        "Remote copy is newer"
                    );
                    replaced += 1;
                    theirs.clone()
                }
                _ => record,
            }
        })
        .collect();

    let mut remote_only: Vec<&R> = remote
        .iter()
        .filter(|(id, _)| !seen.contains(*id))
        .map(|(_, r)| r)
        .collect();
    remote_only.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));

    let inserted = remote_only.len();
    records.extend(remote_only.into_iter().cloned());

    MergeOutcome {
        records,
        inserted,
        replaced,
    }
}

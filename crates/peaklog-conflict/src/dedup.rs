//! Semantic deduplication
//!
//! Collapses records that share a [`DedupKey`] but carry different
//! identities. Such pairs come from creation races, e.g. two devices loading
//! the same preset list at once, each minting fresh identities.
//!
//! Only records that expose a key take part; record kinds without one pass
//! through untouched.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use peaklog_core::domain::{DedupKey, RecordId, SyncableRecord};
use tracing::debug;

/// Result of [`dedup`]
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome<R> {
    /// At most one record per key, in input order
    pub survivors: Vec<R>,
    /// Identities of the discarded duplicates, in input order
    pub removed: Vec<RecordId>,
}

impl<R> DedupOutcome<R> {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Keeps the newest record of every dedup group
///
/// Within a group the record with the greatest `lastModified` survives; on
/// equal markers the one that comes first in `records` survives.
pub fn dedup<R: SyncableRecord>(records: Vec<R>) -> DedupOutcome<R> {
    // key -> index of the current winner
    let mut winners: HashMap<DedupKey, usize> = HashMap::new();
    let mut losers = vec![false; records.len()];

    for (idx, record) in records.iter().enumerate() {
        let Some(key) = record.dedup_key() else {
            continue;
        };
        match winners.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
            Entry::Occupied(mut slot) => {
                let best = *slot.get();
                if record.last_modified() > records[best].last_modified() {
                    losers[best] = true;
                    slot.insert(idx);
                } else {
                    losers[idx] = true;
                }
            }
        }
    }

    let mut survivors = Vec::with_capacity(records.len());
    let mut removed = Vec::new();
    for (record, lost) in records.into_iter().zip(losers) {
        if lost {
            debug!(record_id = %record.id(), "Dropping duplicate record");
            removed.push(record.id().clone());
        } else {
            survivors.push(record);
        }
    }

    DedupOutcome { survivors, removed }
}

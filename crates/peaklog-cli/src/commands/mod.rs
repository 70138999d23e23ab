//! CLI subcommands
//!
//! Every command opens the local collections through [`open_context`], acts
//! on the [`SyncContext`] and reports through the output formatter.

pub mod backup;
pub mod completions;
pub mod config;
pub mod dedup;
pub mod mountain;
pub mod status;
pub mod track;

use anyhow::{Context, Result};
use peaklog_core::config::Config;
use peaklog_core::domain::RecordId;
use peaklog_sync::{RetryPolicy, SyncContext};
use tracing::debug;

/// Opens the configured slot store and loads both collections
///
/// No remote binding is attached, so every change stays local.
pub async fn open_context(config: &Config) -> Result<SyncContext> {
    let slots = peaklog_cache::open_slot_store(&config.storage)
        .await
        .with_context(|| {
            format!(
                "Failed to open {:?} storage in {}",
                config.storage.backend,
                config.storage.data_dir.display()
            )
        })?;
    debug!(data_dir = %config.storage.data_dir.display(), "Local store opened");

    SyncContext::open(slots, None, RetryPolicy::from_config(&config.sync))
        .await
        .context("Failed to load local collections")
}

/// clap value parser for record identities
pub fn parse_record_id(s: &str) -> Result<RecordId, String> {
    RecordId::new(s).map_err(|e| e.to_string())
}

//! Status command - Display collection and sync status
//!
//! Provides the `peaklog status` CLI command which shows:
//! 1. Record counts for both collections
//! 2. Climbing progress per category
//! 3. Storage backend and location
//! 4. Sync status (the CLI never binds a remote store, so it stays idle)

use anyhow::Result;
use clap::Args;
use peaklog_core::config::Config;
use peaklog_core::domain::MountainCategory;
use peaklog_sync::SyncContext;
use tracing::info;

use super::open_context;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {}

/// Climbed/total per category, in display order
fn progress(ctx: &SyncContext) -> Vec<(MountainCategory, usize, usize)> {
    MountainCategory::ALL
        .into_iter()
        .map(|category| {
            let in_category = ctx.mountains().iter().filter(|m| m.category == category);
            let total = in_category.clone().count();
            let climbed = in_category.filter(|m| m.is_climbed).count();
            (category, climbed, total)
        })
        .filter(|(_, _, total)| *total > 0)
        .collect()
}

impl StatusCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = open_context(config).await?;
        let report = ctx.status();

        info!(status = %report.status, "Showing status");

        let mountains = ctx.mountains().len();
        let climbed = ctx.mountains().iter().filter(|m| m.is_climbed).count();
        let tracks = ctx.tracks().len();
        let progress = progress(&ctx);

        if format.is_json() {
            let categories: serde_json::Map<String, serde_json::Value> = progress
                .iter()
                .map(|(category, climbed, total)| {
                    (
                        category.label().to_string(),
                        serde_json::json!({ "climbed": climbed, "total": total }),
                    )
                })
                .collect();
            formatter.print_json(&serde_json::json!({
                "status": report.status.to_string(),
                "error": report.error.as_ref().map(|e| e.to_string()),
                "signedIn": ctx.is_signed_in(),
                "user": config.sync.user,
                "mountains": mountains,
                "climbed": climbed,
                "gpxTracks": tracks,
                "categories": categories,
                "storage": {
                    "backend": format!("{:?}", config.storage.backend).to_lowercase(),
                    "dataDir": config.storage.data_dir.display().to_string(),
                },
            }));
            return Ok(());
        }

        formatter.success(&format!("Sync status: {}", report.status));
        if let Some(err) = &report.error {
            formatter.warn(&err.to_string());
        }
        match &config.sync.user {
            Some(user) => formatter.info(&format!("User: {user} (remote store not bound)")),
            None => formatter.info("User: not signed in"),
        }
        formatter.info("");
        formatter.info(&format!("Mountains: {mountains} ({climbed} climbed)"));
        for (category, climbed, total) in &progress {
            formatter.info(&format!("  {:<10} {climbed}/{total}", category.label()));
        }
        formatter.info(&format!("GPX tracks: {tracks}"));
        formatter.info("");
        formatter.info(&format!(
            "Storage: {:?} in {}",
            config.storage.backend,
            config.storage.data_dir.display()
        ));
        Ok(())
    }
}

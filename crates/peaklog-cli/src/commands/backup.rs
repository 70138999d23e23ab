//! Backup commands - Export, import and preset loading
//!
//! Provides `peaklog export`, `peaklog import` and `peaklog preset`:
//! 1. Export writes every mountain and track as one backup document
//! 2. Import folds in records whose id is not stored yet
//! 3. Preset replaces the mountain list with a bundled preset file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use peaklog_core::config::Config;
use peaklog_core::domain::{AppData, PresetMountain};
use tracing::info;

use super::open_context;
use crate::output::{get_formatter, OutputFormat};

// ============================================================================
// Export
// ============================================================================

#[derive(Debug, Args)]
pub struct ExportCommand {
    /// Destination file (defaults to mountain-tracker-backup-<date>.json)
    pub file: Option<PathBuf>,
}

impl ExportCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = open_context(config).await?;

        let path = self.file.clone().unwrap_or_else(|| {
            PathBuf::from(AppData::file_name(chrono::Local::now().date_naive()))
        });
        let data = ctx.export();
        let json = data.to_json()?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(path = %path.display(), "Backup exported");

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "path": path.display().to_string(),
                "mountains": data.mountains.len(),
                "gpxTracks": data.gpx_tracks.len(),
            }));
        } else {
            formatter.success(&format!(
                "Exported {} mountain(s) and {} track(s)",
                data.mountains.len(),
                data.gpx_tracks.len()
            ));
            formatter.info(&format!("File: {}", path.display()));
        }
        Ok(())
    }
}

// ============================================================================
// Import
// ============================================================================

#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Backup file produced by `peaklog export`
    pub file: PathBuf,
}

impl ImportCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let payload = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        let mut ctx = open_context(config).await?;
        let summary = ctx
            .import(&payload)
            .await
            .with_context(|| format!("Failed to import {}", self.file.display()))?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "mountains": summary.mountains,
                "gpxTracks": summary.tracks,
            }));
        } else if summary.mountains + summary.tracks == 0 {
            formatter.success("Nothing new to import");
        } else {
            formatter.success(&format!(
                "Imported {} mountain(s) and {} track(s)",
                summary.mountains, summary.tracks
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Preset
// ============================================================================

#[derive(Debug, Args)]
pub struct PresetCommand {
    /// JSON array of preset mountains
    pub file: PathBuf,

    /// Only load when no mountains are stored yet
    #[arg(long)]
    pub if_empty: bool,
}

impl PresetCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let presets = read_presets(&self.file).await?;

        let mut ctx = open_context(config).await?;
        let replaced = ctx.mountains().len();
        let loaded = if self.if_empty {
            ctx.load_presets_if_empty(presets).await?
        } else {
            Some(ctx.load_presets(presets).await?)
        };

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "loaded": loaded.unwrap_or(0),
                "skipped": loaded.is_none(),
            }));
            return Ok(());
        }
        match loaded {
            Some(count) => {
                formatter.success(&format!("Loaded {count} preset mountain(s)"));
                if replaced > 0 {
                    formatter.warn(&format!("Replaced {replaced} existing mountain(s)"));
                }
            }
            None => formatter.success("Mountains already present; presets not loaded"),
        }
        Ok(())
    }
}

async fn read_presets(path: &std::path::Path) -> Result<Vec<PresetMountain>> {
    let payload = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&payload)
        .with_context(|| format!("{} is not a preset mountain list", path.display()))
}

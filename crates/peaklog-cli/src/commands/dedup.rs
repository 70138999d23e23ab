//! Dedup command - Collapse duplicate mountains
//!
//! Mountains with the same name and position (rounded to two decimals) are
//! the same peak; the most recently modified copy is kept.

use anyhow::Result;
use clap::Args;
use peaklog_core::config::Config;

use super::open_context;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DedupCommand {}

impl DedupCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let mut ctx = open_context(config).await?;

        let before = ctx.mountains().len();
        let removed = ctx.deduplicate().await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "before": before,
                "after": ctx.mountains().len(),
                "removed": removed.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            }));
        } else if removed.is_empty() {
            formatter.success("No duplicates found");
        } else {
            formatter.success(&format!(
                "Removed {} duplicate(s); {} mountain(s) left",
                removed.len(),
                ctx.mountains().len()
            ));
            for id in &removed {
                formatter.info(&format!("removed {id}"));
            }
        }
        Ok(())
    }
}

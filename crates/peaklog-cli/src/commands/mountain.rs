//! Mountain commands - Create, list, edit and delete mountains
//!
//! Provides the `peaklog mountain` CLI commands. Every change is stored
//! locally through the sync context; when signed in elsewhere, the same
//! operations would also be sent to the remote store.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Subcommand;
use peaklog_core::config::Config;
use peaklog_core::domain::{
    ClimbedStatus, Mountain, MountainCategory, MountainDraft, MountainFilter, RecordId,
};
use tracing::info;

use super::{open_context, parse_record_id};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Mountain subcommands
#[derive(Debug, Subcommand)]
pub enum MountainCommand {
    /// Add a mountain
    Add {
        /// Mountain name
        #[arg(long)]
        name: String,
        /// Elevation in metres
        #[arg(long)]
        elevation: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// hyakumeizan|nihyakumeizan|sanbyakumeizan|other (or the stored label)
        #[arg(long, value_parser = parse_category, default_value = "other")]
        category: MountainCategory,
        /// Mark as already climbed
        #[arg(long)]
        climbed: bool,
        /// Climb date (YYYY-MM-DD), kept only with --climbed
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// List mountains
    List {
        /// Only names containing this text
        #[arg(long)]
        search: Option<String>,
        /// Only these categories (repeatable)
        #[arg(long, value_parser = parse_category)]
        category: Vec<MountainCategory>,
        /// all|climbed|unclimbed
        #[arg(long, value_parser = parse_climbed_status, default_value = "all")]
        status: ClimbedStatus,
    },
    /// Edit a mountain's fields
    Edit {
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        elevation: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
        #[arg(long, value_parser = parse_category)]
        category: Option<MountainCategory>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Flip a mountain's climbed status
    Toggle {
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
        /// Climb date to record (defaults to today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Delete a mountain
    Delete {
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
    },
    /// Link an existing GPX track to a mountain
    Link {
        #[arg(value_parser = parse_record_id)]
        mountain_id: RecordId,
        #[arg(value_parser = parse_record_id)]
        track_id: RecordId,
    },
}

impl MountainCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let mut ctx = open_context(config).await?;

        match self {
            MountainCommand::Add {
                name,
                elevation,
                lat,
                lng,
                category,
                climbed,
                date,
                notes,
            } => {
                let draft = MountainDraft {
                    name: name.clone(),
                    elevation: *elevation,
                    lat: *lat,
                    lng: *lng,
                    category: *category,
                    is_climbed: *climbed,
                    climb_date: date.map(format_date),
                    notes: notes.clone(),
                };
                let mountain = ctx.add_mountain(draft).await?;
                info!(mountain_id = %mountain.id, "Mountain added");
                report(&*formatter, format, "Added", &mountain)
            }
            MountainCommand::List {
                search,
                category,
                status,
            } => {
                let filter = MountainFilter {
                    search_text: search.clone().unwrap_or_default(),
                    categories: category.clone(),
                    climbed_status: *status,
                };
                let mountains = ctx.filtered_mountains(&filter);
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&mountains)?);
                    return Ok(());
                }
                if mountains.is_empty() {
                    formatter.info("No mountains match");
                    return Ok(());
                }
                let climbed = mountains.iter().filter(|m| m.is_climbed).count();
                formatter.success(&format!(
                    "{} mountain{} ({} climbed)",
                    mountains.len(),
                    if mountains.len() == 1 { "" } else { "s" },
                    climbed
                ));
                for m in mountains {
                    println!("{}", summary_line(m));
                }
                Ok(())
            }
            MountainCommand::Edit {
                id,
                name,
                elevation,
                lat,
                lng,
                category,
                notes,
            } => {
                let current = ctx
                    .mountain(id)
                    .with_context(|| format!("No mountain with id {id}"))?;
                let mut draft = current.to_draft();
                if let Some(name) = name {
                    draft.name = name.clone();
                }
                if let Some(elevation) = elevation {
                    draft.elevation = *elevation;
                }
                if let Some(lat) = lat {
                    draft.lat = *lat;
                }
                if let Some(lng) = lng {
                    draft.lng = *lng;
                }
                if let Some(category) = category {
                    draft.category = *category;
                }
                if let Some(notes) = notes {
                    draft.notes = notes.clone();
                }
                let mountain = ctx.update_mountain(id, draft).await?;
                report(&*formatter, format, "Updated", &mountain)
            }
            MountainCommand::Toggle { id, date } => {
                let today = date.unwrap_or_else(|| chrono::Local::now().date_naive());
                let mountain = ctx.toggle_climbed(id, today).await?;
                let verb = if mountain.is_climbed {
                    "Marked climbed:"
                } else {
                    "Marked not climbed:"
                };
                report(&*formatter, format, verb, &mountain)
            }
            MountainCommand::Delete { id } => {
                let mountain = ctx.delete_mountain(id).await?;
                let orphaned = ctx.tracks_for(id).len();
                if orphaned > 0 {
                    formatter.warn(&format!(
                        "{orphaned} track(s) still reference the deleted mountain"
                    ));
                }
                report(&*formatter, format, "Deleted", &mountain)
            }
            MountainCommand::Link {
                mountain_id,
                track_id,
            } => {
                if ctx.track(track_id).is_none() {
                    anyhow::bail!("No track with id {track_id}");
                }
                let mountain = ctx.link_track(mountain_id, track_id.clone()).await?;
                report(&*formatter, format, "Linked track to", &mountain)
            }
        }
    }
}

fn report(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    verb: &str,
    mountain: &Mountain,
) -> Result<()> {
    if format.is_json() {
        formatter.print_json(&serde_json::to_value(mountain)?);
    } else {
        formatter.success(&format!("{verb} {} ({})", mountain.name, mountain.id));
    }
    Ok(())
}

fn summary_line(m: &Mountain) -> String {
    let mark = if m.is_climbed { "\u{2713}" } else { " " };
    let date = m.climb_date.as_deref().unwrap_or("");
    format!(
        "[{mark}] {:<20} {:>6.0} m  {:<8} {:<10} {}",
        m.name,
        m.elevation,
        m.category.label(),
        date,
        m.id
    )
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_category(s: &str) -> Result<MountainCategory, String> {
    MountainCategory::parse(s).ok_or_else(|| format!("unknown category '{s}'"))
}

fn parse_climbed_status(s: &str) -> Result<ClimbedStatus, String> {
    match s.to_ascii_lowercase().as_str() {
        "all" => Ok(ClimbedStatus::All),
        "climbed" => Ok(ClimbedStatus::Climbed),
        "unclimbed" => Ok(ClimbedStatus::Unclimbed),
        _ => Err(format!("expected all, climbed or unclimbed, got '{s}'")),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{e} (expected YYYY-MM-DD)"))
}

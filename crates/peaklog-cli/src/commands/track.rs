//! Track commands - List and delete stored GPX tracks
//!
//! Tracks are created by the GPX upload flow of the app; the CLI only shows
//! and removes them.

use anyhow::Result;
use clap::Subcommand;
use peaklog_core::config::Config;
use peaklog_core::domain::{GpxTrack, RecordId};

use super::{open_context, parse_record_id};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum TrackCommand {
    /// List tracks
    List {
        /// Only tracks linked to this mountain
        #[arg(long, value_parser = parse_record_id)]
        mountain: Option<RecordId>,
    },
    /// Delete a track and unlink it from its mountain
    Delete {
        #[arg(value_parser = parse_record_id)]
        id: RecordId,
    },
}

impl TrackCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let mut ctx = open_context(config).await?;

        match self {
            TrackCommand::List { mountain } => {
                let tracks: Vec<&GpxTrack> = match mountain {
                    Some(id) => ctx.tracks_for(id),
                    None => ctx.tracks().iter().collect(),
                };
                if format.is_json() {
                    // raw_gpx is omitted from listings
                    let rows: Vec<serde_json::Value> = tracks
                        .iter()
                        .map(|t| {
                            serde_json::json!({
                                "id": t.id.as_str(),
                                "name": t.name,
                                "fileName": t.file_name,
                                "totalDistance": t.total_distance,
                                "elevationGain": t.elevation_gain,
                                "trackDate": t.track_date,
                                "color": t.color,
                                "mountainId": t.mountain_id.as_ref().map(|id| id.as_str()),
                                "createdAt": t.created_at.as_str(),
                            })
                        })
                        .collect();
                    formatter.print_json(&serde_json::Value::Array(rows));
                    return Ok(());
                }
                if tracks.is_empty() {
                    formatter.info("No tracks");
                    return Ok(());
                }
                formatter.success(&format!("{} track(s)", tracks.len()));
                for t in tracks {
                    let mountain = t
                        .mountain_id
                        .as_ref()
                        .and_then(|id| ctx.mountain(id))
                        .map_or("-", |m| m.name.as_str());
                    println!("{}", track_line(t, mountain));
                }
                Ok(())
            }
            TrackCommand::Delete { id } => {
                let track = ctx.delete_track(id).await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "deleted": track.id.as_str(),
                    }));
                } else {
                    formatter.success(&format!("Deleted track {} ({})", track.name, track.id));
                }
                Ok(())
            }
        }
    }
}

fn track_line(t: &GpxTrack, mountain: &str) -> String {
    let distance = t
        .distance_km()
        .map_or_else(|| "-".to_string(), |km| format!("{km:.1} km"));
    let gain = t
        .elevation_gain
        .map_or_else(|| "-".to_string(), |m| format!("+{m:.0} m"));
    format!(
        "{:<24} {:>9} {:>8}  {:<10} {:<16} {}",
        t.name,
        distance,
        gain,
        t.track_date.as_deref().unwrap_or("-"),
        mountain,
        t.id
    )
}

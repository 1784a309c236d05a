#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the incident map.
//!
//! Runs the storage server, analyzes a place (or the map center) through
//! the n8n workflows, merges incident files, and inspects danger zones.
//! Without a subcommand it falls back to an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`progress::init_logger`]) to route
//! `log` output through `indicatif::MultiProgress` so that log lines and
//! spinners never fight for the terminal.

mod analysis;
mod interactive;
mod progress;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use incident_map_client::{
    CategoryFilter, ClientConfig,
    api::{HttpIncidentApi, IncidentApi},
};
use incident_map_map::zones::{opacity_by_zoom, prepare_zones};

use crate::analysis::{Action, AnalysisOptions};

#[derive(Parser)]
#[command(
    name = "incident_map_cli",
    about = "Incident map toolchain: storage server, analysis, and data tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the storage API server (configured via environment)
    Serve,
    /// Geocode a place and analyze it
    Search {
        /// Place name, e.g. "Kazimierz, Kraków"
        place: String,
        #[command(flatten)]
        map: MapArgs,
    },
    /// Analyze the current map area
    Start {
        /// Map center latitude
        #[arg(long, requires = "lon", allow_negative_numbers = true)]
        lat: Option<f64>,
        /// Map center longitude
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lon: Option<f64>,
        #[command(flatten)]
        map: MapArgs,
    },
    /// Merge every incident array in a directory into one file
    Merge {
        /// Directory of JSON files
        dir: PathBuf,
        #[arg(long, default_value = "incidents.json")]
        output: PathBuf,
    },
    /// Show how danger zones would be drawn
    Zones {
        #[arg(default_value = analysis::DEFAULT_ZONES_PATH)]
        file: PathBuf,
        /// Zoom level to compute fill opacity for
        #[arg(long, default_value = "13")]
        zoom: f64,
    },
    /// Clear a stored category, or every known category
    Clear {
        /// Category to clear; all known categories if omitted
        category: Option<String>,
    },
    /// Check that the storage API is up
    Health,
}

#[derive(Args)]
struct MapArgs {
    /// Danger zone file
    #[arg(long, default_value = analysis::DEFAULT_ZONES_PATH)]
    zones: PathBuf,
    /// Where to write the rendered layers
    #[arg(long, default_value = analysis::DEFAULT_OUTPUT_PATH)]
    output: PathBuf,
    /// Only criminal incidents
    #[arg(long)]
    criminal: bool,
    /// Only road accidents
    #[arg(long)]
    road: bool,
    /// Only other incidents
    #[arg(long)]
    other: bool,
}

impl MapArgs {
    fn into_options(self, center: Option<(f64, f64)>) -> AnalysisOptions {
        AnalysisOptions {
            zones: self.zones,
            output: self.output,
            filter: CategoryFilter {
                criminal: self.criminal,
                road: self.road,
                other: self.other,
            },
            center,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Serve => serve(false).await?,
        Commands::Search { place, map } => {
            analysis::run(&multi, Action::Search(place), &map.into_options(None)).await?;
        }
        Commands::Start { lat, lon, map } => {
            let center = lat.zip(lon);
            analysis::run(&multi, Action::Start, &map.into_options(center)).await?;
        }
        Commands::Merge { dir, output } => merge(&dir, &output).await?,
        Commands::Zones { file, zoom } => zones(&file, zoom).await,
        Commands::Clear { category } => clear(category.as_deref()).await?,
        Commands::Health => health().await?,
    }

    Ok(())
}

/// Runs the storage server to completion.
pub async fn serve(interactive: bool) -> Result<(), Box<dyn std::error::Error>> {
    // The server uses actix-web's runtime, so it runs in a blocking task to
    // avoid nesting tokio runtimes.
    tokio::task::spawn_blocking(move || {
        actix_web::rt::System::new().block_on(async move {
            if interactive {
                incident_map_server::interactive::run().await
            } else {
                incident_map_server::run_server().await
            }
        })
    })
    .await??;
    Ok(())
}

/// Merges a directory of incident files and reports the result.
pub async fn merge(dir: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let summary = incident_map_storage::merge::merge_into(dir, output).await?;

    println!(
        "Merged {} incidents from {} file(s) into {}",
        summary.total,
        summary.files_merged.len(),
        output.display()
    );
    for skipped in &summary.files_skipped {
        println!("  skipped {}", skipped.display());
    }
    Ok(())
}

/// Prints the zones in drawing order.
pub async fn zones(file: &Path, zoom: f64) {
    let zones = analysis::load_zones(file).await;
    let prepared = prepare_zones(&zones);
    let opacity = opacity_by_zoom(zoom);

    println!(
        "{:<28} {:>10} {:<10} {:>10}",
        "DISTRICT", "CRIME RATE", "COLOR", "RADIUS (m)"
    );
    println!("{}", "-".repeat(62));
    for zone in &prepared {
        println!(
            "{:<28} {:>10} {:<10} {:>10.0}",
            zone.district_name, zone.crime_rate, zone.color, zone.radius
        );
    }
    println!(
        "\n{} of {} zone(s) drawable, fill opacity {opacity:.3} at zoom {zoom}",
        prepared.len(),
        zones.len()
    );
}

/// Pings the storage API.
pub async fn health() -> Result<(), Box<dyn std::error::Error>> {
    let health = http_api()?.health().await?;
    println!("{} at {}", health.status, health.timestamp);
    Ok(())
}

async fn clear(category: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let api = http_api()?;
    let resp = match category {
        Some(category) => api.clear(category).await?,
        None => api.clear_all().await?,
    };
    println!("{}", resp.message);
    Ok(())
}

fn http_api() -> Result<HttpIncidentApi, Box<dyn std::error::Error>> {
    Ok(HttpIncidentApi::from_config(&ClientConfig::from_env())?)
}

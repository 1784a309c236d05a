//! Map analysis runs driven from the terminal.
//!
//! Builds a [`MapSession`] over an in-memory [`LayerCollection`], performs
//! one search or start action, prints the outcome and incident list, and
//! writes the resulting layers as `GeoJSON` for a Leaflet page to render.

use std::path::{Path, PathBuf};

use incident_map_client::{
    AnalysisOutcome, CategoryFilter, ClientConfig, MapSession, SearchOutcome,
};
use incident_map_incident_models::DangerZone;
use incident_map_map::{DEFAULT_VIEW, LayerCollection, MapView, zones::parse_zones};
use indicatif::MultiProgress;

use crate::progress::spinner;

/// Danger zone file served next to the front end.
pub const DEFAULT_ZONES_PATH: &str = "frontend/dangerzones.json";

/// Where the rendered layers are written.
pub const DEFAULT_OUTPUT_PATH: &str = "incident_map.geojson";

/// What to analyze.
pub enum Action {
    /// Geocode a place and analyze it.
    Search(String),
    /// Analyze the map center.
    Start,
}

/// Settings shared by every analysis run.
pub struct AnalysisOptions {
    pub zones: PathBuf,
    pub output: PathBuf,
    pub filter: CategoryFilter,
    /// Initial map center; Kraków if unset.
    pub center: Option<(f64, f64)>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            zones: PathBuf::from(DEFAULT_ZONES_PATH),
            output: PathBuf::from(DEFAULT_OUTPUT_PATH),
            filter: CategoryFilter::default(),
            center: None,
        }
    }
}

/// Reads the danger zone file. A missing or malformed file draws no zones.
pub async fn load_zones(path: &Path) -> Vec<DangerZone> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) => {
            log::error!("Error loading danger zones from {}: {e}", path.display());
            return Vec::new();
        }
    };

    parse_zones(&text).unwrap_or_else(|e| {
        log::error!("Error parsing danger zones in {}: {e}", path.display());
        Vec::new()
    })
}

/// Runs one analysis and writes the map layers to `options.output`.
///
/// # Errors
///
/// Returns an error if the HTTP client can't be built or the output can't
/// be written. Workflow and storage failures are reported, not returned.
pub async fn run(
    multi: &MultiProgress,
    action: Action,
    options: &AnalysisOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::from_env();
    let view = options
        .center
        .map_or(DEFAULT_VIEW, |(latitude, longitude)| MapView {
            latitude,
            longitude,
            ..DEFAULT_VIEW
        });

    let mut session = MapSession::from_config(LayerCollection::new(view), &config)?
        .with_filter(options.filter);

    let zones = load_zones(&options.zones).await;
    let bar = spinner(multi, &format!("Loading incidents from {}", config.api_url));
    session.init(&zones).await;
    bar.finish_with_message(format!(
        "Loaded {} incidents and {} danger zones",
        session.surface().markers().count(),
        session.surface().circles().count()
    ));

    let bar = spinner(multi, "Waiting for the analysis workflows");
    let outcome = match action {
        Action::Search(place) => match session.search(&place).await {
            SearchOutcome::EmptyQuery => None,
            SearchOutcome::NotFound => {
                bar.finish_and_clear();
                println!("Could not find '{}'", place.trim());
                return write_layers(&session, &options.output).await;
            }
            SearchOutcome::Analyzed(outcome) => Some(outcome),
        },
        Action::Start => Some(session.start().await),
    };
    bar.finish_and_clear();

    if let Some(outcome) = &outcome {
        print_outcome(outcome);
    }
    print_incidents(&session);

    write_layers(&session, &options.output).await
}

fn print_outcome(outcome: &AnalysisOutcome) {
    println!();
    println!(
        "{} ({:.4}, {:.4})",
        outcome.location, outcome.latitude, outcome.longitude
    );
    for category in &outcome.categories {
        let status = match (&category.error, category.saved) {
            (Some(e), _) => format!("failed: {e}"),
            (None, Some(saved)) => format!("saved {saved}"),
            (None, None) => "nothing saved".to_string(),
        };
        println!("  {:<14} found {:<4} {status}", category.category.label(), category.found);
    }
    println!("{}", outcome.message());
}

fn print_incidents(session: &MapSession<LayerCollection>) {
    let items = session.incident_list();
    if items.is_empty() {
        return;
    }

    println!();
    for item in &items {
        println!(
            "{:>4}. {:<14} {:<14} {}",
            item.index,
            item.category.label(),
            item.date,
            item.location
        );
    }
    println!("\n{} incident(s)", items.len());
}

async fn write_layers(
    session: &MapSession<LayerCollection>,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let geojson = session.surface().to_geojson_string()?;
    tokio::fs::write(output, geojson).await?;
    println!("Map layers written to {}", output.display());
    Ok(())
}

//! Interactive tool menu shown when no subcommand is given.

use std::path::PathBuf;

use dialoguer::{Input, MultiSelect, Select};
use incident_map_client::CategoryFilter;
use indicatif::MultiProgress;

use crate::analysis::{self, Action, AnalysisOptions};

#[derive(Clone, Copy)]
enum Tool {
    Search,
    Start,
    Server,
    Merge,
    Zones,
    Health,
}

impl Tool {
    const ALL: &[Self] = &[
        Self::Search,
        Self::Start,
        Self::Server,
        Self::Merge,
        Self::Zones,
        Self::Health,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Search => "Search a place",
            Self::Start => "Analyze current map area",
            Self::Server => "Start server",
            Self::Merge => "Merge incident files",
            Self::Zones => "Inspect danger zones",
            Self::Health => "Check server health",
        }
    }
}

/// Prompts for a tool and runs it.
///
/// # Errors
///
/// Returns an error if the chosen tool fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Incident Map Toolchain");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Search => {
            let place: String = Input::new()
                .with_prompt("Place to analyze")
                .allow_empty(true)
                .interact_text()?;
            let options = prompt_options()?;
            analysis::run(multi, Action::Search(place), &options).await?;
        }
        Tool::Start => {
            let options = prompt_options()?;
            analysis::run(multi, Action::Start, &options).await?;
        }
        Tool::Server => crate::serve(true).await?,
        Tool::Merge => {
            let dir: String = Input::new()
                .with_prompt("Directory of incident files")
                .default("data".to_string())
                .interact_text()?;
            let output: String = Input::new()
                .with_prompt("Output file")
                .default("incidents.json".to_string())
                .interact_text()?;
            crate::merge(&PathBuf::from(dir), &PathBuf::from(output)).await?;
        }
        Tool::Zones => {
            let file: String = Input::new()
                .with_prompt("Danger zone file")
                .default(analysis::DEFAULT_ZONES_PATH.to_string())
                .interact_text()?;
            let zoom: f64 = Input::new()
                .with_prompt("Zoom level")
                .default(13.0)
                .interact_text()?;
            crate::zones(&PathBuf::from(file), zoom).await;
        }
        Tool::Health => crate::health().await?,
    }

    Ok(())
}

/// Asks which categories to show. Leaving everything unchecked shows all.
fn prompt_options() -> Result<AnalysisOptions, dialoguer::Error> {
    let picked = MultiSelect::new()
        .with_prompt("Categories to show (none selects all)")
        .items(&["Criminal", "Road accidents", "Other"])
        .interact()?;

    Ok(AnalysisOptions {
        filter: CategoryFilter {
            criminal: picked.contains(&0),
            road: picked.contains(&1),
            other: picked.contains(&2),
        },
        ..AnalysisOptions::default()
    })
}

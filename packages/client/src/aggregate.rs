//! Fan-out to the workflows and persistence of their results.

use std::sync::Arc;

use futures::future::join_all;
use incident_map_incident_models::IncidentCategory;
use serde::Serialize;
use serde_json::Value;

use crate::{
    api::IncidentApi,
    workflow::{WorkflowPayload, WorkflowTrigger},
};

/// The Criminal / Road / Other checkboxes.
///
/// With nothing checked every category is selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryFilter {
    pub criminal: bool,
    pub road: bool,
    pub other: bool,
}

impl CategoryFilter {
    /// Filter with only the given categories checked.
    #[must_use]
    pub fn only(categories: &[IncidentCategory]) -> Self {
        Self {
            criminal: categories.contains(&IncidentCategory::Criminal),
            road: categories.contains(&IncidentCategory::Road),
            other: categories.contains(&IncidentCategory::Other),
        }
    }

    #[must_use]
    pub const fn none_checked(self) -> bool {
        !self.criminal && !self.road && !self.other
    }

    #[must_use]
    pub const fn is_checked(self, category: IncidentCategory) -> bool {
        match category {
            IncidentCategory::Criminal => self.criminal,
            IncidentCategory::Road => self.road,
            IncidentCategory::Other => self.other,
        }
    }

    /// Whether incidents of `category` are queried and shown.
    #[must_use]
    pub const fn selects(self, category: IncidentCategory) -> bool {
        self.none_checked() || self.is_checked(category)
    }

    /// Categories with a workflow and a stored collection that this filter
    /// selects.
    #[must_use]
    pub fn queried_categories(self) -> Vec<IncidentCategory> {
        IncidentCategory::queryable()
            .iter()
            .copied()
            .filter(|cat| self.selects(*cat))
            .collect()
    }
}

/// What one workflow call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowResult {
    pub category: IncidentCategory,
    /// Empty when the call failed.
    pub incidents: Vec<Value>,
    /// Why the call failed, if it did.
    pub error: Option<String>,
}

/// Triggers every workflow concurrently and waits for all of them.
///
/// A failing workflow yields an empty result and never affects the others.
pub async fn run_workflows(
    triggers: &[Arc<dyn WorkflowTrigger>],
    payload: &WorkflowPayload,
) -> Vec<WorkflowResult> {
    join_all(triggers.iter().map(|trigger| async move {
        let category = trigger.category();
        match trigger.trigger(payload).await {
            Ok(incidents) => WorkflowResult {
                category,
                incidents,
                error: None,
            },
            Err(e) => {
                log::error!("{category} workflow failed: {e}");
                WorkflowResult {
                    category,
                    incidents: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }))
    .await
}

/// Per-category result of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOutcome {
    pub category: IncidentCategory,
    /// Incidents the workflow returned.
    pub found: usize,
    /// Records the storage API reported writing; `None` if nothing was
    /// saved.
    pub saved: Option<usize>,
    /// Workflow or save failure, if any.
    pub error: Option<String>,
}

/// Saves each non-empty result under its category's key.
///
/// Empty results leave the stored collection untouched. Save failures are
/// logged and recorded in the outcome.
pub async fn persist_results(
    api: &dyn IncidentApi,
    results: Vec<WorkflowResult>,
) -> Vec<CategoryOutcome> {
    let mut outcomes = Vec::with_capacity(results.len());

    for result in results {
        let mut outcome = CategoryOutcome {
            category: result.category,
            found: result.incidents.len(),
            saved: None,
            error: result.error,
        };

        match result.category.storage_key() {
            Some(key) if !result.incidents.is_empty() => {
                match api.save(key, &result.incidents).await {
                    Ok(resp) => {
                        log::info!("Saved {} {key} incidents", resp.total);
                        outcome.saved = Some(resp.total);
                    }
                    Err(e) => {
                        log::error!("Error saving {key} incidents: {e}");
                        outcome.error = Some(e.to_string());
                    }
                }
            }
            Some(_) => log::info!("No {} incidents to save", result.category),
            None => log::warn!(
                "Dropping {} incidents with no storage key ({})",
                result.incidents.len(),
                result.category
            ),
        }

        outcomes.push(outcome);
    }

    outcomes
}

/// Summary of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub latitude: f64,
    pub longitude: f64,
    pub location: String,
    pub categories: Vec<CategoryOutcome>,
}

impl AnalysisOutcome {
    /// Incidents found across all categories.
    #[must_use]
    pub fn total(&self) -> usize {
        self.categories.iter().map(|c| c.found).sum()
    }

    /// Status line shown to the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self.total() {
            0 => "No incidents found. Try different location".to_string(),
            n => format!("Analysis complete! Found {n} incidents"),
        }
    }

    /// Status popup body.
    #[must_use]
    pub fn popup_html(&self) -> String {
        let (title, detail) = match self.total() {
            0 => (
                "No incidents found".to_string(),
                "Try different location".to_string(),
            ),
            n => ("Analysis complete!".to_string(), format!("Found {n} incidents")),
        };

        format!(
            "<div style=\"text-align: center; padding: 5px;\">\
             <strong>{title}</strong><br><small>{detail}</small></div>"
        )
    }
}

//! Compile-time registry of the n8n analysis workflows.
//!
//! Each workflow is defined in a TOML file under `workflows/`. The registry
//! embeds these at compile time and exposes them via [`all_workflows`] and
//! [`workflow_for`].

use incident_map_incident_models::IncidentCategory;
use serde::Deserialize;

/// An analysis workflow loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique identifier (e.g., `"criminal"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Category whose incidents the workflow returns.
    pub category: IncidentCategory,
    /// Webhook path, appended to the configured base URL.
    pub path: String,
    /// Whether the workflow is triggered at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Request timeout. Workflows scrape live sites and can take minutes,
    /// so there is none unless set.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

const fn default_true() -> bool {
    true
}

const WORKFLOW_TOMLS: &[(&str, &str)] = &[
    ("criminal", include_str!("../workflows/criminal.toml")),
    ("road", include_str!("../workflows/road.toml")),
];

#[cfg(test)]
const EXPECTED_WORKFLOW_COUNT: usize = 2;

/// Returns all workflow definitions (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (the configs are embedded, so
/// this is caught by the tests below).
#[must_use]
pub fn all_workflows() -> Vec<WorkflowDefinition> {
    WORKFLOW_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse workflow '{name}': {e}"))
        })
        .collect()
}

/// Returns the enabled workflow for a category, if there is one.
#[must_use]
pub fn workflow_for(category: IncidentCategory) -> Option<WorkflowDefinition> {
    all_workflows()
        .into_iter()
        .find(|w| w.enabled && w.category == category)
}

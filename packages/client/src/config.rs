//! Client settings.

use std::time::Duration;

/// Storage API used when `INCIDENT_API_URL` is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// n8n webhook base used when `WORKFLOW_BASE_URL` is unset.
pub const DEFAULT_WORKFLOW_BASE_URL: &str = "http://localhost:5678/webhook-test";

/// Public Nominatim search endpoint.
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Pause between persisting results and reloading them.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Where the client finds its collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Storage API base URL (`INCIDENT_API_URL`).
    pub api_url: String,
    /// Base URL the workflow trigger paths are appended to
    /// (`WORKFLOW_BASE_URL`).
    pub workflow_base_url: String,
    /// Nominatim search endpoint (`GEOCODER_URL`).
    pub geocoder_url: String,
    /// Delay after saving before the collections are reloaded
    /// (`SETTLE_DELAY_MS`).
    pub settle_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            workflow_base_url: DEFAULT_WORKFLOW_BASE_URL.to_string(),
            geocoder_url: DEFAULT_GEOCODER_URL.to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl ClientConfig {
    /// Reads the config from the environment, falling back to the defaults
    /// for unset or unparseable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_url: lookup("INCIDENT_API_URL").unwrap_or(defaults.api_url),
            workflow_base_url: lookup("WORKFLOW_BASE_URL").unwrap_or(defaults.workflow_base_url),
            geocoder_url: lookup("GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            settle_delay: lookup("SETTLE_DELAY_MS")
                .and_then(|ms| ms.parse().ok())
                .map_or(defaults.settle_delay, Duration::from_millis),
        }
    }
}

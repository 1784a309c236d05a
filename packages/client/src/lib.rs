#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map client orchestration for the incident map.
//!
//! An analysis run goes:
//!
//! 1. build a geolocation payload for the place being analyzed;
//! 2. trigger one n8n workflow per selected category, all concurrently
//!    ([`workflow`], configured by [`workflow_registry`]);
//! 3. wait for every call to settle, isolating failures ([`aggregate`]);
//! 4. persist each non-empty result through the storage API ([`api`]);
//! 5. reload the stored collections and redraw the markers
//!    ([`session::MapSession`]).
//!
//! Place searches are resolved with Nominatim ([`geocode`]).

pub mod aggregate;
pub mod api;
pub mod config;
pub mod geocode;
pub mod session;
pub mod workflow;
pub mod workflow_registry;

use thiserror::Error;

pub use aggregate::{AnalysisOutcome, CategoryFilter};
pub use config::ClientConfig;
pub use session::{MapSession, SearchOutcome};

/// Errors from calls to the workflow triggers or the storage API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status.
    #[error("{url} returned HTTP {status}: {message}")]
    Status {
        url: String,
        status: u16,
        /// Error body text, if any.
        message: String,
    },

    /// The response body wasn't the expected shape.
    #[error("Unexpected response from {url}: {message}")]
    Decode {
        url: String,
        message: String,
    },
}

const USER_AGENT: &str = concat!("incident-map/", env!("CARGO_PKG_VERSION"));

/// Builds the HTTP client shared by the triggers, the storage API client,
/// and the geocoder. Nominatim rejects requests without a user agent.
///
/// # Errors
///
/// Returns [`ClientError::Http`] if the TLS backend can't be initialized.
pub fn http_client() -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Joins a base URL and a path with exactly one `/`.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Reads a non-success response into a [`ClientError::Status`].
async fn status_error(url: &str, resp: reqwest::Response) -> ClientError {
    let status = resp.status().as_u16();
    let message = match resp.text().await {
        Ok(body) => serde_json::from_str::<incident_map_server_models::ApiError>(&body)
            .map_or(body, |e| e.error),
        Err(e) => e.to_string(),
    };

    ClientError::Status {
        url: url.to_string(),
        status,
        message,
    }
}

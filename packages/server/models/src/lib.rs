#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types for the incident map storage server.
//!
//! Shared by the server handlers and the HTTP client in
//! `incident_map_client`, so both sides agree on the wire format.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Liveness probe response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Always `"ok"`.
    pub status: String,
    /// Server time (RFC 3339, millisecond precision).
    pub timestamp: String,
}

impl ApiHealth {
    #[must_use]
    pub fn ok_at(now: DateTime<Utc>) -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Response to a collection save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSaveResponse {
    pub success: bool,
    /// Number of records written.
    pub total: usize,
    /// Category the records were written to; `null` for the unkeyed
    /// collection.
    #[serde(rename = "type")]
    pub category: Option<String>,
}

/// Response to a clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiClearResponse {
    pub success: bool,
    pub message: String,
}

/// Response to a culture document save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCultureSaveResponse {
    pub success: bool,
    /// Culture document key.
    #[serde(rename = "type")]
    pub key: String,
}

/// Error body returned with 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

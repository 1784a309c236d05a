#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Incident, category, and danger zone types for the incident map.
//!
//! Stored incident records are free-form JSON; the storage layer keeps them
//! verbatim. The types here are the client-side view of those records,
//! parsed leniently so that a single malformed field never hides the rest of
//! a collection.

use serde::{Deserialize, Deserializer, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Storage key of the criminal incident collection.
pub const CRIMINAL_KEY: &str = "criminal";

/// Storage key of the road incident collection.
pub const ROAD_KEY: &str = "road";

/// Categories whose collections exist from server startup and are emptied
/// by a clear-all.
pub const KNOWN_CATEGORIES: &[&str] = &[CRIMINAL_KEY, ROAD_KEY];

/// Marker color used on the map.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarkerColor {
    Red,
    Orange,
    Blue,
}

/// Closed set of incident categories.
///
/// Workflow results and stored records only carry a free-text
/// `type_of_threat`; [`IncidentCategory::classify`] is the single place
/// that text is mapped onto a category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IncidentCategory {
    /// Crimes (theft, assault, burglary...).
    Criminal,
    /// Road accidents and traffic incidents.
    Road,
    /// Anything else.
    Other,
}

impl IncidentCategory {
    /// Classifies a free-text threat type.
    ///
    /// Matching is a case-insensitive substring test: `"criminal"` wins
    /// over `"road"`/`"accident"`, everything else is [`Self::Other`].
    #[must_use]
    pub fn classify(type_of_threat: &str) -> Self {
        let lower = type_of_threat.to_lowercase();
        if lower.contains("criminal") {
            Self::Criminal
        } else if lower.contains("road") || lower.contains("accident") {
            Self::Road
        } else {
            Self::Other
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Criminal, Self::Road, Self::Other]
    }

    /// Categories backed by a workflow trigger and a storage collection.
    #[must_use]
    pub const fn queryable() -> &'static [Self] {
        &[Self::Criminal, Self::Road]
    }

    /// Storage collection key, or `None` for categories that are never
    /// fetched or persisted on their own.
    #[must_use]
    pub const fn storage_key(self) -> Option<&'static str> {
        match self {
            Self::Criminal => Some(CRIMINAL_KEY),
            Self::Road => Some(ROAD_KEY),
            Self::Other => None,
        }
    }

    #[must_use]
    pub const fn color(self) -> MarkerColor {
        match self {
            Self::Criminal => MarkerColor::Red,
            Self::Road => MarkerColor::Orange,
            Self::Other => MarkerColor::Blue,
        }
    }

    /// Human-readable label used in legends.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Criminal => "Criminal",
            Self::Road => "Road accident",
            Self::Other => "Other",
        }
    }

    /// CSS class of the type badge in the incident list.
    #[must_use]
    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Criminal => "badge-criminal",
            Self::Road => "badge-accident",
            Self::Other => "badge-other",
        }
    }

    /// CSS class of the incident list card.
    #[must_use]
    pub const fn card_class(self) -> &'static str {
        match self {
            Self::Criminal => "criminal-type",
            Self::Road => "accident-type",
            Self::Other => "other-type",
        }
    }
}

/// A geolocated incident as reported by a workflow.
///
/// Coordinates accept both JSON numbers and numeric strings. Fields that
/// fail to parse are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    /// Place name.
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,
    /// Free-text category hint (e.g. `"criminal"`, `"road accident"`).
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_of_threat: String,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub summary: Option<String>,
    /// Link to the source article.
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
}

impl Incident {
    /// Parses a stored record, falling back to defaults for anything that
    /// isn't an object.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Self {
        Self::deserialize(value).unwrap_or_default()
    }

    #[must_use]
    pub fn category(&self) -> IncidentCategory {
        IncidentCategory::classify(&self.type_of_threat)
    }

    /// Returns `(latitude, longitude)` when both are present, finite, and
    /// within WGS84 bounds.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        valid_coordinates(lat, lon).then_some((lat, lon))
    }
}

/// A precomputed circular risk area keyed by a crime-rate statistic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DangerZone {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub crime_rate: Option<f64>,
    /// Area in square meters.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub district_name: String,
}

/// Returns `true` if the pair is a usable WGS84 position.
#[must_use]
pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

/// Identifies one incident collection on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionKey {
    /// The collection written by `POST /api/incidents` without a category.
    Unkeyed,
    /// A named category collection.
    Category(String),
}

impl CollectionKey {
    /// Builds a category key.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidKeyError`] if the key is empty or is not a single
    /// path segment.
    pub fn category(key: &str) -> Result<Self, InvalidKeyError> {
        validate_key(key)?;
        Ok(Self::Category(key.to_string()))
    }

    /// Category name, or `None` for the unkeyed collection.
    #[must_use]
    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Unkeyed => None,
            Self::Category(key) => Some(key),
        }
    }

    /// File name of the collection inside the data directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Unkeyed => "incidents.json".to_string(),
            Self::Category(key) => format!("incidents_{key}.json"),
        }
    }
}

impl std::fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unkeyed => f.write_str("unkeyed"),
            Self::Category(key) => f.write_str(key),
        }
    }
}

/// Checks that a storage key can be embedded in a file name.
///
/// # Errors
///
/// Returns [`InvalidKeyError`] for empty keys and keys containing a path
/// separator or NUL. Keys are always wrapped in a prefix and extension, so
/// dots alone can't leave the data directory.
pub fn validate_key(key: &str) -> Result<(), InvalidKeyError> {
    if key.is_empty() || key.contains(['/', '\\', '\0']) {
        return Err(InvalidKeyError {
            key: key.to_string(),
        });
    }
    Ok(())
}

/// Error returned when a storage key cannot be mapped to a file name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid storage key {key:?}")]
pub struct InvalidKeyError {
    /// The rejected key.
    pub key: String,
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite()))
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

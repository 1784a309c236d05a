//! Place search via Nominatim / `OpenStreetMap`.
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use async_trait::async_trait;
use thiserror::Error;

/// A resolved place.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedPlace {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Canonical name returned by the geocoder.
    pub display_name: Option<String>,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,
}

/// Resolves free-form place names to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns the best match for `query`, or `None` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the lookup itself fails.
    async fn search(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError>;
}

/// [`Geocoder`] backed by a Nominatim search endpoint.
///
/// The public instance allows 1 request per second; searches are
/// user-driven so no limiter is applied here.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimGeocoder {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn search(&self, query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Nominatim search response, taking the first result.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedPlace>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    let Some(first) = results.first() else {
        return Ok(None);
    };

    let coordinate = |field: &str| {
        first[field]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| GeocodeError::Parse {
                message: format!("Missing {field} in Nominatim response"),
            })
    };

    Ok(Some(GeocodedPlace {
        latitude: coordinate("lat")?,
        longitude: coordinate("lon")?,
        display_name: first["display_name"].as_str().map(String::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nominatim_result() {
        let body = serde_json::json!([{
            "lat": "50.0619474",
            "lon": "19.9368564",
            "display_name": "Rynek Główny, Stare Miasto, Kraków"
        }, {
            "lat": "0",
            "lon": "0"
        }]);
        let place = parse_response(&body).unwrap().unwrap();
        assert!((place.latitude - 50.061_947_4).abs() < 1e-6);
        assert!((place.longitude - 19.936_856_4).abs() < 1e-6);
        assert_eq!(
            place.display_name.as_deref(),
            Some("Rynek Główny, Stare Miasto, Kraków")
        );
    }

    #[test]
    fn parses_nominatim_empty() {
        let body = serde_json::json!([]);
        assert!(parse_response(&body).unwrap().is_none());
    }

    #[test]
    fn rejects_malformed_results() {
        assert!(parse_response(&serde_json::json!({"error": "bad"})).is_err());
        assert!(parse_response(&serde_json::json!([{"lat": "50.06"}])).is_err());
    }
}

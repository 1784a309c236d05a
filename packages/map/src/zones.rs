//! Danger zone rendering math.
//!
//! Zones are drawn as equal-area circles whose fill color is bucketed by
//! crime rate and whose opacity fades as the user zooms in, so that street
//! detail stays readable at close range.

use incident_map_incident_models::{DangerZone, valid_coordinates};
use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::html::escape;

/// Zoom level at and below which zones are drawn at [`MAX_OPACITY`].
pub const FADE_START_ZOOM: f64 = 10.0;

/// Zoom level at and above which zones are drawn at [`MIN_OPACITY`].
pub const FADE_END_ZOOM: f64 = 19.0;

/// Fill opacity when zoomed out.
pub const MAX_OPACITY: f64 = 0.325;

/// Fill opacity when fully zoomed in.
pub const MIN_OPACITY: f64 = 0.001;

/// Fill color bucket of a zone, from most to least dangerous.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ZoneColor {
    Red,
    Orange,
    Yellow,
    LightGreen,
    Green,
}

impl ZoneColor {
    /// All buckets, most dangerous first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Red,
            Self::Orange,
            Self::Yellow,
            Self::LightGreen,
            Self::Green,
        ]
    }

    /// Legend text for the bucket. Rates may be fractional, so each range
    /// is open at the bottom and closed at the top.
    #[must_use]
    pub const fn range_label(self) -> &'static str {
        match self {
            Self::Red => "> 51",
            Self::Orange => "> 40 – 51",
            Self::Yellow => "> 29 – 40",
            Self::LightGreen => "> 20 – 29",
            Self::Green => "≤ 20",
        }
    }
}

/// Buckets a crime rate into a fill color.
///
/// Thresholds are exclusive: a rate of exactly 51 is orange, not red.
#[must_use]
pub fn zone_color(crime_rate: f64) -> ZoneColor {
    if crime_rate > 51.0 {
        ZoneColor::Red
    } else if crime_rate > 40.0 {
        ZoneColor::Orange
    } else if crime_rate > 29.0 {
        ZoneColor::Yellow
    } else if crime_rate > 20.0 {
        ZoneColor::LightGreen
    } else {
        ZoneColor::Green
    }
}

/// Fill opacity for a zoom level.
///
/// Linear between [`MAX_OPACITY`] at [`FADE_START_ZOOM`] and
/// [`MIN_OPACITY`] at [`FADE_END_ZOOM`], clamped outside that range.
#[must_use]
pub fn opacity_by_zoom(zoom: f64) -> f64 {
    if zoom <= FADE_START_ZOOM {
        return MAX_OPACITY;
    }
    if zoom >= FADE_END_ZOOM {
        return MIN_OPACITY;
    }

    let ratio = (zoom - FADE_START_ZOOM) / (FADE_END_ZOOM - FADE_START_ZOOM);
    ratio.mul_add(-(MAX_OPACITY - MIN_OPACITY), MAX_OPACITY)
}

/// Radius of the circle with the same area as the zone.
#[must_use]
pub fn zone_radius(area: f64) -> f64 {
    (area / std::f64::consts::PI).sqrt()
}

/// A zone ready to be drawn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableZone {
    pub latitude: f64,
    pub longitude: f64,
    pub crime_rate: f64,
    /// Circle radius in meters.
    pub radius: f64,
    pub color: ZoneColor,
    pub district_name: String,
}

impl RenderableZone {
    /// Returns `None` for zones without usable coordinates, crime rate, or
    /// a positive area.
    #[must_use]
    pub fn from_zone(zone: &DangerZone) -> Option<Self> {
        let (latitude, longitude) = (zone.latitude?, zone.longitude?);
        let crime_rate = zone.crime_rate?;
        let size = zone.size.filter(|s| *s > 0.0)?;

        if !valid_coordinates(latitude, longitude) {
            return None;
        }

        Some(Self {
            latitude,
            longitude,
            crime_rate,
            radius: zone_radius(size),
            color: zone_color(crime_rate),
            district_name: zone.district_name.clone(),
        })
    }

    #[must_use]
    pub fn popup_html(&self) -> String {
        format!(
            "<b>District:</b> {}<br>\n<b>Crime rate:</b> {}<br>",
            escape(&self.district_name),
            self.crime_rate
        )
    }
}

/// Parses a danger zone file (a JSON array of zones).
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if the text isn't a JSON array of
/// objects.
pub fn parse_zones(text: &str) -> Result<Vec<DangerZone>, serde_json::Error> {
    serde_json::from_str(text)
}

/// Drops unusable zones and orders the rest by ascending crime rate.
///
/// Circles added later are drawn on top, so this order puts the most
/// dangerous zones above the safer ones. Zones with equal rates keep their
/// input order.
#[must_use]
pub fn prepare_zones(zones: &[DangerZone]) -> Vec<RenderableZone> {
    let mut renderable: Vec<RenderableZone> = zones
        .iter()
        .filter_map(|zone| {
            let prepared = RenderableZone::from_zone(zone);
            if prepared.is_none() {
                log::debug!("Skipping incomplete danger zone {:?}", zone.district_name);
            }
            prepared
        })
        .collect();

    renderable.sort_by(|a, b| a.crime_rate.total_cmp(&b.crime_rate));
    renderable
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-12;

    fn zone(rate: f64, name: &str) -> DangerZone {
        DangerZone {
            latitude: Some(50.06),
            longitude: Some(19.94),
            crime_rate: Some(rate),
            size: Some(1_000_000.0),
            district_name: name.to_string(),
        }
    }

    #[test]
    fn fractional_rates_fall_inside_their_legend_range() {
        for (rate, label) in [
            (20.5, "> 20 – 29"),
            (29.5, "> 29 – 40"),
            (40.5, "> 40 – 51"),
            (51.5, "> 51"),
            (20.0, "≤ 20"),
        ] {
            assert_eq!(zone_color(rate).range_label(), label, "rate {rate}");
        }
    }

    #[test]
    fn color_buckets_are_exclusive_at_thresholds() {
        assert_eq!(zone_color(52.0), ZoneColor::Red);
        assert_eq!(zone_color(51.0), ZoneColor::Orange);
        assert_eq!(zone_color(41.0), ZoneColor::Orange);
        assert_eq!(zone_color(40.0), ZoneColor::Yellow);
        assert_eq!(zone_color(29.5), ZoneColor::Yellow);
        assert_eq!(zone_color(29.0), ZoneColor::LightGreen);
        assert_eq!(zone_color(21.0), ZoneColor::LightGreen);
        assert_eq!(zone_color(20.0), ZoneColor::Green);
        assert_eq!(zone_color(15.0), ZoneColor::Green);
    }

    #[test]
    fn opacity_endpoints_and_midpoint() {
        assert!((opacity_by_zoom(10.0) - MAX_OPACITY).abs() < EPSILON);
        assert!((opacity_by_zoom(19.0) - MIN_OPACITY).abs() < EPSILON);
        let midpoint = f64::midpoint(MAX_OPACITY, MIN_OPACITY);
        assert!((opacity_by_zoom(14.5) - midpoint).abs() < EPSILON);
    }

    #[test]
    fn opacity_is_clamped_outside_fade_range() {
        assert!((opacity_by_zoom(3.0) - MAX_OPACITY).abs() < EPSILON);
        assert!((opacity_by_zoom(22.0) - MIN_OPACITY).abs() < EPSILON);
    }

    #[test]
    fn opacity_decreases_with_zoom() {
        let mut previous = opacity_by_zoom(10.0);
        for step in 1..=18 {
            let zoom = 10.0 + f64::from(step) * 0.5;
            let current = opacity_by_zoom(zoom);
            assert!(current < previous, "opacity rose at zoom {zoom}");
            previous = current;
        }
    }

    #[test]
    fn radius_preserves_area() {
        let r = zone_radius(std::f64::consts::PI * 100.0);
        assert!((r - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zones_sorted_ascending_with_stable_ties() {
        let zones = vec![
            zone(60.0, "Stare Miasto"),
            zone(10.0, "Bieżanów"),
            zone(35.0, "Grzegórzki"),
            zone(10.0, "Wola Justowska"),
        ];
        let names: Vec<String> = prepare_zones(&zones)
            .into_iter()
            .map(|z| z.district_name)
            .collect();
        assert_eq!(
            names,
            vec!["Bieżanów", "Wola Justowska", "Grzegórzki", "Stare Miasto"]
        );
    }

    #[test]
    fn incomplete_zones_are_skipped() {
        let mut no_size = zone(30.0, "no size");
        no_size.size = Some(0.0);
        let mut no_rate = zone(30.0, "no rate");
        no_rate.crime_rate = None;
        let mut no_coords = zone(30.0, "no coords");
        no_coords.latitude = None;

        let prepared = prepare_zones(&[no_size, no_rate, no_coords, zone(30.0, "ok")]);
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].district_name, "ok");
    }

    #[test]
    fn parses_zone_file() {
        let zones = parse_zones(
            r#"[{"latitude": 50.05, "longitude": 19.93, "crime_rate": 45.2,
                 "size": 5600000, "district_name": "Stare Miasto"}]"#,
        )
        .unwrap();
        let prepared = prepare_zones(&zones);
        assert_eq!(prepared[0].color, ZoneColor::Orange);
        assert!(prepared[0].popup_html().contains("Stare Miasto"));
    }
}

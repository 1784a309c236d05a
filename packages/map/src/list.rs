//! Incident list panel entries.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use incident_map_incident_models::{Incident, IncidentCategory};
use serde::Serialize;

use crate::html::escape;

/// One entry of the incident list panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentListItem {
    /// Position of the incident in the rendered collection.
    pub index: usize,
    pub category: IncidentCategory,
    pub type_label: String,
    pub date: String,
    pub location: String,
    pub summary: String,
    pub url: Option<String>,
    /// Where the map centers when the entry is clicked.
    pub focus: Option<(f64, f64)>,
}

impl IncidentListItem {
    #[must_use]
    pub fn new(index: usize, incident: &Incident) -> Self {
        Self {
            index,
            category: incident.category(),
            type_label: non_empty_or(&incident.type_of_threat, "Unknown"),
            date: format_incident_date(incident.date.as_deref()),
            location: non_empty_or(&incident.location, "Unknown location"),
            summary: incident
                .summary
                .as_deref()
                .map_or_else(|| "No description available".to_string(), str::to_string),
            url: incident.url.clone(),
            focus: incident.coordinates(),
        }
    }

    /// Renders the entry as an `<li>` element.
    #[must_use]
    pub fn to_html(&self) -> String {
        let link = self.url.as_deref().map_or_else(String::new, |url| {
            format!(
                "<div class=\"incident-link\"><a href=\"{}\" target=\"_blank\" class=\"read-more\">\
                 Read more <span class=\"material-icons\">open_in_new</span></a></div>",
                escape(url)
            )
        });

        format!(
            "<li class=\"incident-item\" data-incident-id=\"{index}\">\
             <div class=\"incident-card {card}\">\
             <div class=\"incident-header\">\
             <span class=\"incident-type-badge {badge}\">{label}</span>\
             <span class=\"incident-date\">{date}</span>\
             </div>\
             <div class=\"incident-location\">\
             <span class=\"material-icons location-icon\">location_on</span>\
             <span>{location}</span>\
             </div>\
             <div class=\"incident-summary\">{summary}</div>\
             {link}\
             </div></li>",
            index = self.index,
            card = self.category.card_class(),
            badge = self.category.badge_class(),
            label = escape(&self.type_label),
            date = escape(&self.date),
            location = escape(&self.location),
            summary = escape(&self.summary),
        )
    }
}

/// Formats an incident date as `Mon D, YYYY`.
///
/// Absent dates read "Date unknown"; dates that don't parse are shown as
/// given.
#[must_use]
pub fn format_incident_date(date: Option<&str>) -> String {
    let Some(raw) = date.map(str::trim).filter(|d| !d.is_empty()) else {
        return "Date unknown".to_string();
    };

    parse_date(raw).map_or_else(
        || raw.to_string(),
        |d| d.format("%b %-d, %Y").to_string(),
    )
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
                .map(|d| d.date())
                .ok()
        })
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_common_date_shapes() {
        assert_eq!(format_incident_date(Some("2025-03-01")), "Mar 1, 2025");
        assert_eq!(
            format_incident_date(Some("2024-11-23T18:45:00Z")),
            "Nov 23, 2024"
        );
        assert_eq!(
            format_incident_date(Some("2024-11-23 18:45:00")),
            "Nov 23, 2024"
        );
    }

    #[test]
    fn unparseable_dates_pass_through() {
        assert_eq!(format_incident_date(Some("last Tuesday")), "last Tuesday");
        assert_eq!(format_incident_date(None), "Date unknown");
        assert_eq!(format_incident_date(Some("  ")), "Date unknown");
    }

    #[test]
    fn list_item_fills_fallbacks() {
        let item = IncidentListItem::new(3, &Incident::default());
        assert_eq!(item.type_label, "Unknown");
        assert_eq!(item.location, "Unknown location");
        assert_eq!(item.summary, "No description available");
        assert_eq!(item.category, IncidentCategory::Other);
        assert!(item.focus.is_none());

        let html = item.to_html();
        assert!(html.contains("data-incident-id=\"3\""));
        assert!(html.contains("badge-other"));
        assert!(!html.contains("Read more"));
    }

    #[test]
    fn list_item_uses_category_classes() {
        let incident = Incident {
            latitude: Some(50.05),
            longitude: Some(19.94),
            location: "Kazimierz".to_string(),
            type_of_threat: "Road accident".to_string(),
            url: Some("https://example.com".to_string()),
            ..Incident::default()
        };
        let item = IncidentListItem::new(0, &incident);
        let html = item.to_html();
        assert!(html.contains("accident-type"));
        assert!(html.contains("badge-accident"));
        assert!(html.contains("Read more"));
        assert_eq!(item.focus, Some((50.05, 19.94)));
    }
}

//! Incident marker styling and popup content.

use incident_map_incident_models::{Incident, IncidentCategory, MarkerColor};
use serde::Serialize;

use crate::html::escape;

const ICON_BASE_URL: &str =
    "https://raw.githubusercontent.com/pointhi/leaflet-color-markers/master/img";

const SHADOW_URL: &str = "https://cdnjs.cloudflare.com/ajax/libs/leaflet/1.7.1/images/marker-shadow.png";

/// Leaflet `L.icon` options for a colored marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerIcon {
    pub icon_url: String,
    pub shadow_url: String,
    pub icon_size: [i32; 2],
    pub icon_anchor: [i32; 2],
    pub popup_anchor: [i32; 2],
    pub shadow_size: [i32; 2],
}

impl MarkerIcon {
    #[must_use]
    pub fn for_color(color: MarkerColor) -> Self {
        Self {
            icon_url: format!("{ICON_BASE_URL}/marker-icon-2x-{color}.png"),
            shadow_url: SHADOW_URL.to_string(),
            icon_size: [25, 41],
            icon_anchor: [12, 41],
            popup_anchor: [1, -34],
            shadow_size: [41, 41],
        }
    }

    #[must_use]
    pub fn for_category(category: IncidentCategory) -> Self {
        Self::for_color(category.color())
    }
}

/// Popup body for an incident marker.
#[must_use]
pub fn incident_popup_html(incident: &Incident) -> String {
    let threat = if incident.type_of_threat.is_empty() {
        "Unknown".to_string()
    } else {
        escape(&incident.type_of_threat)
    };

    let mut html = format!(
        "<div style=\"max-width: 300px;\">\n\
         <h3 style=\"margin-top: 0; color: #333;\">{}</h3>\n\
         <p style=\"margin: 10px 0;\"><strong>Danger type:</strong> {threat}</p>\n",
        escape(&incident.location)
    );

    if let Some(date) = &incident.date {
        html.push_str(&format!(
            "<p style=\"margin: 10px 0;\"><strong>Date:</strong> {}</p>\n",
            escape(date)
        ));
    }

    html.push_str(&format!(
        "<p style=\"margin: 10px 0; text-align: justify;\">{}</p>\n",
        incident
            .summary
            .as_deref()
            .map_or_else(|| "No description available".to_string(), escape)
    ));

    if let Some(url) = &incident.url {
        html.push_str(&format!(
            "<p style=\"margin: 10px 0;\"><a href=\"{}\" target=\"_blank\" style=\"color: #0066cc;\">See more →</a></p>\n",
            escape(url)
        ));
    }

    html.push_str("</div>");
    html
}

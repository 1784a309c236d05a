//! Map legends.

use geojson::JsonObject;
use incident_map_incident_models::IncidentCategory;
use serde_json::Value;

use crate::{html::escape, zones::ZoneColor};

/// Legend of incident marker colors.
#[must_use]
pub fn incident_legend_html() -> String {
    let rows: String = IncidentCategory::all()
        .iter()
        .map(|cat| {
            format!(
                "<div><span style=\"color: {};\">●</span> {}</div>",
                cat.color(),
                cat.label()
            )
        })
        .collect();

    format!("<h4 style=\"margin: 0 0 10px 0;\">Danger types</h4>{rows}")
}

/// Legend of danger zone fill colors.
#[must_use]
pub fn zone_legend_html() -> String {
    let rows: String = ZoneColor::all()
        .iter()
        .map(|color| {
            format!(
                "<div><span style=\"color: {color};\">■</span> Crime rate {}</div>",
                escape(color.range_label())
            )
        })
        .collect();

    format!("<h4 style=\"margin: 0 0 10px 0;\">Danger zones</h4>{rows}")
}

/// Both legends, keyed `incident_legend` and `zone_legend`, for attaching
/// to an exported layer file.
#[must_use]
pub fn legend_members() -> JsonObject {
    let mut members = JsonObject::new();
    members.insert(
        "incident_legend".to_string(),
        Value::from(incident_legend_html()),
    );
    members.insert("zone_legend".to_string(), Value::from(zone_legend_html()));
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legends_list_every_entry() {
        let incidents = incident_legend_html();
        for cat in IncidentCategory::all() {
            assert!(incidents.contains(cat.label()));
        }
        assert_eq!(zone_legend_html().matches("■").count(), ZoneColor::all().len());
    }
}

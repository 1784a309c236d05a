//! The map surface the client draws onto.
//!
//! [`MapSurface`] is the small set of operations the client needs from a
//! slippy map (markers, circles, popups, view). [`LayerCollection`] is an
//! in-memory implementation that can be exported as a `GeoJSON`
//! `FeatureCollection` for any web map to render.

use std::collections::{BTreeMap, BTreeSet};

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};
use incident_map_incident_models::IncidentCategory;
use serde::Serialize;
use serde_json::Value;

use crate::{legend::legend_members, markers::MarkerIcon, zones::ZoneColor};

/// Handle of a layer added to a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LayerId(pub u64);

/// Map center and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f64,
}

/// Kraków city center, where the map opens.
pub const DEFAULT_VIEW: MapView = MapView {
    latitude: 50.0647,
    longitude: 19.9450,
    zoom: 13.0,
};

impl Default for MapView {
    fn default() -> Self {
        DEFAULT_VIEW
    }
}

/// An incident marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerSpec {
    pub latitude: f64,
    pub longitude: f64,
    pub category: IncidentCategory,
    pub icon: MarkerIcon,
    pub popup_html: String,
}

/// A filled danger zone circle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleSpec {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
    pub color: ZoneColor,
    pub fill_opacity: f64,
    pub popup_html: String,
}

/// A standalone popup anchored at a point (status messages).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub latitude: f64,
    pub longitude: f64,
    pub html: String,
}

/// Operations the client performs on the displayed map.
///
/// Layers are drawn in the order they were added; later layers are on top.
pub trait MapSurface {
    /// Current center and zoom.
    fn view(&self) -> MapView;

    /// Recenters the map.
    fn set_view(&mut self, view: MapView);

    fn add_marker(&mut self, marker: MarkerSpec) -> LayerId;

    fn add_circle(&mut self, circle: CircleSpec) -> LayerId;

    /// Removes a layer. Unknown ids are ignored.
    fn remove_layer(&mut self, id: LayerId);

    /// Shows or hides a layer without removing it.
    fn set_visible(&mut self, id: LayerId, visible: bool);

    /// Updates the fill opacity of a circle layer.
    fn set_fill_opacity(&mut self, id: LayerId, opacity: f64);

    /// Opens the popup bound to a layer.
    fn open_popup(&mut self, id: LayerId);

    /// Shows a standalone popup, replacing any open one.
    fn show_popup(&mut self, popup: Popup);
}

/// In-memory [`MapSurface`].
#[derive(Debug, Default, Clone)]
pub struct LayerCollection {
    view: MapView,
    next_id: u64,
    markers: BTreeMap<LayerId, MarkerSpec>,
    circles: BTreeMap<LayerId, CircleSpec>,
    hidden: BTreeSet<LayerId>,
    popup: Option<LayerId>,
    message: Option<Popup>,
}

impl LayerCollection {
    #[must_use]
    pub fn new(view: MapView) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    fn allocate(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    #[must_use]
    pub fn marker(&self, id: LayerId) -> Option<&MarkerSpec> {
        self.markers.get(&id)
    }

    #[must_use]
    pub fn circle(&self, id: LayerId) -> Option<&CircleSpec> {
        self.circles.get(&id)
    }

    /// Markers in drawing order.
    pub fn markers(&self) -> impl Iterator<Item = (LayerId, &MarkerSpec)> {
        self.markers.iter().map(|(id, m)| (*id, m))
    }

    /// Circles in drawing order.
    pub fn circles(&self) -> impl Iterator<Item = (LayerId, &CircleSpec)> {
        self.circles.iter().map(|(id, c)| (*id, c))
    }

    #[must_use]
    pub fn is_visible(&self, id: LayerId) -> bool {
        (self.markers.contains_key(&id) || self.circles.contains_key(&id))
            && !self.hidden.contains(&id)
    }

    /// Layer whose popup is open, if any.
    #[must_use]
    pub const fn open_popup_id(&self) -> Option<LayerId> {
        self.popup
    }

    /// Standalone popup currently shown, if any.
    #[must_use]
    pub const fn message(&self) -> Option<&Popup> {
        self.message.as_ref()
    }

    /// Number of layers currently shown.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.markers
            .keys()
            .chain(self.circles.keys())
            .filter(|id| !self.hidden.contains(id))
            .count()
    }

    /// Exports the visible layers.
    ///
    /// Circles come first so markers render above the zones. Every feature
    /// is a `Point`; circle radii travel in the `radius` property. The map
    /// legends ride along as foreign members.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let circles = self
            .circles
            .iter()
            .filter(|(id, _)| !self.hidden.contains(id))
            .map(|(id, circle)| {
                let mut props = JsonObject::new();
                props.insert("kind".to_string(), Value::from("zone"));
                props.insert("radius".to_string(), Value::from(circle.radius));
                props.insert("color".to_string(), Value::from(circle.color.to_string()));
                props.insert(
                    "fill_opacity".to_string(),
                    Value::from(circle.fill_opacity),
                );
                props.insert(
                    "popup".to_string(),
                    Value::from(circle.popup_html.clone()),
                );
                point_feature(Some(*id), circle.latitude, circle.longitude, props)
            });

        let markers = self
            .markers
            .iter()
            .filter(|(id, _)| !self.hidden.contains(id))
            .map(|(id, marker)| {
                let mut props = JsonObject::new();
                props.insert("kind".to_string(), Value::from("incident"));
                props.insert(
                    "category".to_string(),
                    Value::from(marker.category.to_string()),
                );
                props.insert(
                    "color".to_string(),
                    Value::from(marker.category.color().to_string()),
                );
                props.insert(
                    "icon_url".to_string(),
                    Value::from(marker.icon.icon_url.clone()),
                );
                props.insert(
                    "popup".to_string(),
                    Value::from(marker.popup_html.clone()),
                );
                point_feature(Some(*id), marker.latitude, marker.longitude, props)
            });

        let message = self.message.iter().map(|popup| {
            let mut props = JsonObject::new();
            props.insert("kind".to_string(), Value::from("popup"));
            props.insert("popup".to_string(), Value::from(popup.html.clone()));
            point_feature(None, popup.latitude, popup.longitude, props)
        });

        FeatureCollection {
            bbox: None,
            features: circles.chain(markers).chain(message).collect(),
            foreign_members: Some(legend_members()),
        }
    }

    /// Pretty-printed `GeoJSON` of the visible layers.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_geojson_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_feature_collection())
    }
}

fn point_feature(
    id: Option<LayerId>,
    latitude: f64,
    longitude: f64,
    properties: JsonObject,
) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::Point(vec![
            longitude, latitude,
        ]))),
        id: id.map(|id| Id::Number(id.0.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

impl MapSurface for LayerCollection {
    fn view(&self) -> MapView {
        self.view
    }

    fn set_view(&mut self, view: MapView) {
        self.view = view;
    }

    fn add_marker(&mut self, marker: MarkerSpec) -> LayerId {
        let id = self.allocate();
        self.markers.insert(id, marker);
        id
    }

    fn add_circle(&mut self, circle: CircleSpec) -> LayerId {
        let id = self.allocate();
        self.circles.insert(id, circle);
        id
    }

    fn remove_layer(&mut self, id: LayerId) {
        self.markers.remove(&id);
        self.circles.remove(&id);
        self.hidden.remove(&id);
        if self.popup == Some(id) {
            self.popup = None;
        }
    }

    fn set_visible(&mut self, id: LayerId, visible: bool) {
        if visible {
            self.hidden.remove(&id);
        } else {
            self.hidden.insert(id);
            if self.popup == Some(id) {
                self.popup = None;
            }
        }
    }

    fn set_fill_opacity(&mut self, id: LayerId, opacity: f64) {
        if let Some(circle) = self.circles.get_mut(&id) {
            circle.fill_opacity = opacity;
        }
    }

    fn open_popup(&mut self, id: LayerId) {
        if self.is_visible(id) {
            self.popup = Some(id);
            self.message = None;
        }
    }

    fn show_popup(&mut self, popup: Popup) {
        self.popup = None;
        self.message = Some(popup);
    }
}

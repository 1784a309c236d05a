//! The map session controller.
//!
//! [`MapSession`] owns everything one open map needs: the surface, the
//! marker and zone layers drawn on it, the current filter, and the remote
//! collaborators. It is created once, [`MapSession::init`]ialized with the
//! danger zones, driven by user actions, and finally torn down.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::Utc;
use futures::future::join_all;
use incident_map_incident_models::{DangerZone, Incident, IncidentCategory};
use incident_map_map::{
    LayerId, MapSurface, MapView, Popup,
    html::escape,
    list::IncidentListItem,
    markers::{MarkerIcon, incident_popup_html},
    surface::{CircleSpec, MarkerSpec},
    zones::{opacity_by_zoom, prepare_zones},
};

use crate::{
    ClientConfig, ClientError,
    aggregate::{AnalysisOutcome, CategoryFilter, persist_results, run_workflows},
    api::{HttpIncidentApi, IncidentApi},
    geocode::{Geocoder, NominatimGeocoder},
    workflow::{HttpWorkflowTrigger, WorkflowPayload, WorkflowTrigger},
    workflow_registry::workflow_for,
};

/// Zoom level the map jumps to after a successful place search.
pub const SEARCH_ZOOM: f64 = 15.0;

/// Zoom level used when focusing a single incident from the list.
pub const FOCUS_ZOOM: f64 = 16.0;

/// Location name used when analyzing the current map center.
pub const CURRENT_AREA_LABEL: &str = "Current map area";

fn http_triggers(client: &reqwest::Client, base_url: &str) -> Vec<Arc<dyn WorkflowTrigger>> {
    IncidentCategory::queryable()
        .iter()
        .filter_map(|category| {
            let Some(definition) = workflow_for(*category) else {
                log::warn!("No enabled workflow for {category} incidents");
                return None;
            };
            let trigger =
                HttpWorkflowTrigger::from_definition(client.clone(), base_url, &definition);
            log::debug!("{category} workflow at {}", trigger.url());
            Some(Arc::new(trigger) as Arc<dyn WorkflowTrigger>)
        })
        .collect()
}

/// Result of a place search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The query was blank; nothing happened.
    EmptyQuery,
    /// The place couldn't be resolved.
    NotFound,
    /// The place was found and analyzed.
    Analyzed(AnalysisOutcome),
}

#[derive(Debug, Clone)]
struct RenderedIncident {
    layer: LayerId,
    incident: Incident,
}

/// Controller for one open map.
pub struct MapSession<S: MapSurface> {
    surface: S,
    api: Arc<dyn IncidentApi>,
    geocoder: Arc<dyn Geocoder>,
    triggers: Vec<Arc<dyn WorkflowTrigger>>,
    settle_delay: Duration,
    filter: CategoryFilter,
    loaded: BTreeSet<IncidentCategory>,
    incidents: Vec<RenderedIncident>,
    zones: Vec<LayerId>,
}

impl<S: MapSurface> MapSession<S> {
    pub fn new(
        surface: S,
        api: Arc<dyn IncidentApi>,
        geocoder: Arc<dyn Geocoder>,
        triggers: Vec<Arc<dyn WorkflowTrigger>>,
    ) -> Self {
        Self {
            surface,
            api,
            geocoder,
            triggers,
            settle_delay: crate::config::DEFAULT_SETTLE_DELAY,
            filter: CategoryFilter::default(),
            loaded: BTreeSet::new(),
            incidents: Vec::new(),
            zones: Vec::new(),
        }
    }

    /// Builds a session talking HTTP to the services in `config`, with one
    /// trigger per queryable category that has an enabled workflow.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Http`] if the HTTP client can't be built.
    pub fn from_config(surface: S, config: &ClientConfig) -> Result<Self, ClientError> {
        let client = crate::http_client()?;
        let triggers = http_triggers(&client, &config.workflow_base_url);

        Ok(Self::new(
            surface,
            Arc::new(HttpIncidentApi::new(client.clone(), config.api_url.clone())),
            Arc::new(NominatimGeocoder::new(client, config.geocoder_url.clone())),
            triggers,
        )
        .with_settle_delay(config.settle_delay))
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the filter the first load uses.
    #[must_use]
    pub fn with_filter(mut self, filter: CategoryFilter) -> Self {
        self.filter = filter;
        self
    }

    pub const fn surface(&self) -> &S {
        &self.surface
    }

    pub const fn filter(&self) -> CategoryFilter {
        self.filter
    }

    /// Draws the danger zones and loads the stored incidents.
    pub async fn init(&mut self, zones: &[DangerZone]) {
        self.render_zones(zones);
        self.reload().await;
    }

    /// Replaces the zone circles, least dangerous first so the riskier zones
    /// end up on top.
    pub fn render_zones(&mut self, zones: &[DangerZone]) {
        for id in self.zones.drain(..) {
            self.surface.remove_layer(id);
        }

        let opacity = opacity_by_zoom(self.surface.view().zoom);
        for zone in prepare_zones(zones) {
            let id = self.surface.add_circle(CircleSpec {
                latitude: zone.latitude,
                longitude: zone.longitude,
                radius: zone.radius,
                color: zone.color,
                fill_opacity: opacity,
                popup_html: zone.popup_html(),
            });
            self.zones.push(id);
        }

        log::info!("Rendered {} danger zones", self.zones.len());
    }

    /// Refits zone opacity after the user zoomed.
    pub fn on_zoom(&mut self, zoom: f64) {
        let view = self.surface.view();
        self.surface.set_view(MapView { zoom, ..view });

        let opacity = opacity_by_zoom(zoom);
        for id in &self.zones {
            self.surface.set_fill_opacity(*id, opacity);
        }
    }

    /// Reloads every selected category and redraws all incident markers.
    ///
    /// Returns the number of markers drawn. A category that fails to load
    /// is logged and drawn as empty.
    pub async fn reload(&mut self) -> usize {
        let categories = self.filter.queried_categories();
        let api = &self.api;

        let loads = join_all(categories.iter().filter_map(|cat| {
            cat.storage_key()
                .map(|key| async move { (key, api.load(key).await) })
        }))
        .await;

        let mut records = Vec::new();
        for (key, result) in loads {
            match result {
                Ok(items) => {
                    log::debug!("Loaded {} {key} incidents", items.len());
                    records.extend(items);
                }
                Err(e) => log::error!("Error reloading {key} incidents: {e}"),
            }
        }

        self.clear_markers();
        self.loaded = categories.into_iter().collect();

        for record in &records {
            let incident = Incident::from_value(record);
            let Some((latitude, longitude)) = incident.coordinates() else {
                continue;
            };

            let category = incident.category();
            let layer = self.surface.add_marker(MarkerSpec {
                latitude,
                longitude,
                category,
                icon: MarkerIcon::for_category(category),
                popup_html: incident_popup_html(&incident),
            });
            if !self.filter.selects(category) {
                self.surface.set_visible(layer, false);
            }
            self.incidents.push(RenderedIncident { layer, incident });
        }

        log::info!(
            "Loaded {} incidents, {} with coordinates",
            records.len(),
            self.incidents.len()
        );
        self.incidents.len()
    }

    fn clear_markers(&mut self) {
        for rendered in self.incidents.drain(..) {
            self.surface.remove_layer(rendered.layer);
        }
    }

    /// Runs the selected workflows for a location, persists what they found,
    /// and redraws the markers.
    pub async fn analyze(
        &mut self,
        latitude: f64,
        longitude: f64,
        location: &str,
    ) -> AnalysisOutcome {
        let selected = self.filter.queried_categories();
        let triggers: Vec<Arc<dyn WorkflowTrigger>> = self
            .triggers
            .iter()
            .filter(|t| selected.contains(&t.category()))
            .cloned()
            .collect();

        if triggers.is_empty() {
            log::warn!("No workflows selected for {location}");
        }

        let payload = WorkflowPayload::new(latitude, longitude, location, Utc::now());
        let results = run_workflows(&triggers, &payload).await;
        let categories = persist_results(self.api.as_ref(), results).await;

        if categories.iter().any(|c| c.saved.is_some()) {
            if !self.settle_delay.is_zero() {
                tokio::time::sleep(self.settle_delay).await;
            }
            self.reload().await;
        }

        let outcome = AnalysisOutcome {
            latitude,
            longitude,
            location: location.to_string(),
            categories,
        };

        log::info!("{location}: {}", outcome.message());
        self.surface.show_popup(Popup {
            latitude,
            longitude,
            html: outcome.popup_html(),
        });

        outcome
    }

    /// Geocodes a place, centers the map on it, and analyzes it.
    pub async fn search(&mut self, query: &str) -> SearchOutcome {
        let query = query.trim();
        if query.is_empty() {
            return SearchOutcome::EmptyQuery;
        }

        let place = match self.geocoder.search(query).await {
            Ok(place) => place,
            Err(e) => {
                log::error!("Error geocoding {query:?}: {e}");
                None
            }
        };

        let Some(place) = place else {
            let view = self.surface.view();
            self.surface.show_popup(Popup {
                latitude: view.latitude,
                longitude: view.longitude,
                html: format!("Could not find '{}'", escape(query)),
            });
            return SearchOutcome::NotFound;
        };

        self.surface.set_view(MapView {
            latitude: place.latitude,
            longitude: place.longitude,
            zoom: SEARCH_ZOOM,
        });

        SearchOutcome::Analyzed(self.analyze(place.latitude, place.longitude, query).await)
    }

    /// Analyzes the current map center.
    pub async fn start(&mut self) -> AnalysisOutcome {
        let view = self.surface.view();
        self.analyze(view.latitude, view.longitude, CURRENT_AREA_LABEL)
            .await
    }

    /// Changes the category filter.
    ///
    /// Markers are shown or hidden in place; categories that weren't
    /// loaded under the previous filter are fetched.
    pub async fn apply_filter(&mut self, filter: CategoryFilter) {
        self.filter = filter;

        if filter
            .queried_categories()
            .iter()
            .any(|cat| !self.loaded.contains(cat))
        {
            self.reload().await;
            return;
        }

        for rendered in &self.incidents {
            self.surface
                .set_visible(rendered.layer, filter.selects(rendered.incident.category()));
        }
    }

    /// List panel entries for the incidents the filter shows.
    #[must_use]
    pub fn incident_list(&self) -> Vec<IncidentListItem> {
        self.incidents
            .iter()
            .enumerate()
            .filter(|(_, r)| self.filter.selects(r.incident.category()))
            .map(|(index, r)| IncidentListItem::new(index, &r.incident))
            .collect()
    }

    /// Centers the map on a listed incident and opens its popup.
    ///
    /// Returns `false` if `index` doesn't name a drawn incident.
    pub fn focus_incident(&mut self, index: usize) -> bool {
        let Some(rendered) = self.incidents.get(index) else {
            return false;
        };
        let Some((latitude, longitude)) = rendered.incident.coordinates() else {
            return false;
        };

        let layer = rendered.layer;
        self.surface.set_view(MapView {
            latitude,
            longitude,
            zoom: FOCUS_ZOOM,
        });
        self.surface.open_popup(layer);
        true
    }

    /// Removes every layer this session drew.
    pub fn teardown(&mut self) {
        self.clear_markers();
        for id in self.zones.drain(..) {
            self.surface.remove_layer(id);
        }
        self.loaded.clear();
    }

    /// Tears the session down and hands the surface back.
    pub fn into_surface(mut self) -> S {
        self.teardown();
        self.surface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::{GeocodeError, GeocodedPlace};
    use async_trait::async_trait;
    use incident_map_map::{DEFAULT_VIEW, LayerCollection};
    use incident_map_server_models::{ApiClearResponse, ApiHealth, ApiSaveResponse};
    use serde_json::{Value, json};
    use std::{collections::BTreeMap, sync::Mutex};

    struct FakeTrigger {
        category: IncidentCategory,
        result: Result<Vec<Value>, u16>,
        payloads: Mutex<Vec<WorkflowPayload>>,
    }

    impl FakeTrigger {
        fn new(category: IncidentCategory, result: Result<Vec<Value>, u16>) -> Arc<Self> {
            Arc::new(Self {
                category,
                result,
                payloads: Mutex::new(Vec::new()),
            })
        }
    }

    fn dyn_trigger(trigger: &Arc<FakeTrigger>) -> Arc<dyn WorkflowTrigger> {
        trigger.clone()
    }

    #[async_trait]
    impl WorkflowTrigger for FakeTrigger {
        fn category(&self) -> IncidentCategory {
            self.category
        }

        async fn trigger(&self, payload: &WorkflowPayload) -> Result<Vec<Value>, ClientError> {
            self.payloads.lock().unwrap().push(payload.clone());
            self.result.clone().map_err(|status| ClientError::Status {
                url: "http://n8n.test".to_string(),
                status,
                message: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct MemoryApi {
        collections: Mutex<BTreeMap<String, Vec<Value>>>,
    }

    impl MemoryApi {
        fn with(collections: &[(&str, Vec<Value>)]) -> Arc<Self> {
            Arc::new(Self {
                collections: Mutex::new(
                    collections
                        .iter()
                        .map(|(k, v)| ((*k).to_string(), v.clone()))
                        .collect(),
                ),
            })
        }

        fn stored(&self, key: &str) -> Vec<Value> {
            self.collections
                .lock()
                .unwrap()
                .get(key)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl IncidentApi for MemoryApi {
        async fn save(
            &self,
            category: &str,
            incidents: &[Value],
        ) -> Result<ApiSaveResponse, ClientError> {
            self.collections
                .lock()
                .unwrap()
                .insert(category.to_string(), incidents.to_vec());
            Ok(ApiSaveResponse {
                success: true,
                total: incidents.len(),
                category: Some(category.to_string()),
            })
        }

        async fn load(&self, category: &str) -> Result<Vec<Value>, ClientError> {
            Ok(self.stored(category))
        }

        async fn clear(&self, category: &str) -> Result<ApiClearResponse, ClientError> {
            self.collections.lock().unwrap().remove(category);
            Ok(ApiClearResponse {
                success: true,
                message: format!("{category} cleared"),
            })
        }

        async fn clear_all(&self) -> Result<ApiClearResponse, ClientError> {
            self.collections.lock().unwrap().clear();
            Ok(ApiClearResponse {
                success: true,
                message: "All incidents cleared".to_string(),
            })
        }

        async fn health(&self) -> Result<ApiHealth, ClientError> {
            Ok(ApiHealth::ok_at(Utc::now()))
        }
    }

    struct FakeGeocoder(Option<GeocodedPlace>);

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn search(&self, _query: &str) -> Result<Option<GeocodedPlace>, GeocodeError> {
            Ok(self.0.clone())
        }
    }

    fn incident(lat: f64, lon: f64, threat: &str) -> Value {
        json!({
            "latitude": lat,
            "longitude": lon,
            "location": "Kraków",
            "type_of_threat": threat
        })
    }

    fn session(
        api: Arc<MemoryApi>,
        geocoder: Option<GeocodedPlace>,
        triggers: Vec<Arc<dyn WorkflowTrigger>>,
    ) -> MapSession<LayerCollection> {
        MapSession::new(
            LayerCollection::new(DEFAULT_VIEW),
            api,
            Arc::new(FakeGeocoder(geocoder)),
            triggers,
        )
        .with_settle_delay(Duration::ZERO)
    }

    fn zone(rate: f64) -> DangerZone {
        DangerZone {
            latitude: Some(50.05),
            longitude: Some(19.93),
            crime_rate: Some(rate),
            size: Some(2_000_000.0),
            district_name: format!("district {rate}"),
        }
    }

    fn marker_count(session: &MapSession<LayerCollection>) -> usize {
        session.surface().markers().count()
    }

    #[test]
    fn http_triggers_cover_every_queryable_category() {
        let triggers = http_triggers(&reqwest::Client::new(), "http://n8n:5678/webhook");
        let categories: Vec<IncidentCategory> = triggers.iter().map(|t| t.category()).collect();
        assert_eq!(categories, IncidentCategory::queryable());
    }

    #[tokio::test]
    async fn init_draws_zones_and_markers_with_coordinates() {
        let api = MemoryApi::with(&[
            (
                "criminal",
                vec![
                    incident(50.06, 19.94, "criminal"),
                    json!({"latitude": "bad", "longitude": 19.9}),
                ],
            ),
            ("road", vec![incident(50.07, 19.95, "road accident")]),
        ]);
        let mut session = session(api, None, Vec::new());

        session.init(&[zone(60.0), zone(10.0)]).await;

        let map = session.surface();
        let colors: Vec<String> = map.circles().map(|(_, c)| c.color.to_string()).collect();
        assert_eq!(colors, vec!["green", "red"]);
        assert_eq!(marker_count(&session), 2);
    }

    #[tokio::test]
    async fn analyze_persists_successes_and_reloads() {
        let api = MemoryApi::with(&[("road", vec![incident(50.0, 19.0, "road")])]);
        let criminal = FakeTrigger::new(
            IncidentCategory::Criminal,
            Ok(vec![
                incident(50.01, 19.91, "criminal"),
                incident(50.02, 19.92, "criminal"),
                incident(50.03, 19.93, "criminal"),
            ]),
        );
        let road = FakeTrigger::new(IncidentCategory::Road, Err(500));
        let mut session = session(
            api.clone(),
            None,
            vec![dyn_trigger(&criminal), dyn_trigger(&road)],
        );

        let outcome = session.analyze(50.06, 19.94, "Rynek").await;

        assert_eq!(outcome.total(), 3);
        assert_eq!(api.stored("criminal").len(), 3);
        assert_eq!(api.stored("road").len(), 1, "failed workflow leaves road untouched");
        assert_eq!(marker_count(&session), 4);
        assert_eq!(
            session.surface().message().unwrap().html,
            outcome.popup_html()
        );
        assert_eq!(criminal.payloads.lock().unwrap()[0].location, "Rynek");
        assert_eq!(road.payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn analyze_only_triggers_selected_categories() {
        let criminal = FakeTrigger::new(IncidentCategory::Criminal, Ok(Vec::new()));
        let road = FakeTrigger::new(IncidentCategory::Road, Ok(Vec::new()));
        let mut session = session(
            Arc::new(MemoryApi::default()),
            None,
            vec![dyn_trigger(&criminal), dyn_trigger(&road)],
        );

        session
            .apply_filter(CategoryFilter::only(&[IncidentCategory::Road]))
            .await;
        let outcome = session.analyze(50.0, 19.0, "Podgórze").await;

        assert_eq!(outcome.total(), 0);
        assert!(outcome.popup_html().contains("No incidents found"));
        assert!(criminal.payloads.lock().unwrap().is_empty());
        assert_eq!(road.payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_not_found_shows_popup_at_center() {
        let trigger = FakeTrigger::new(IncidentCategory::Criminal, Ok(Vec::new()));
        let mut session = session(
            Arc::new(MemoryApi::default()),
            None,
            vec![dyn_trigger(&trigger)],
        );

        assert_eq!(session.search("Atlantis").await, SearchOutcome::NotFound);

        let popup = session.surface().message().unwrap();
        assert_eq!(popup.html, "Could not find 'Atlantis'");
        assert!((popup.latitude - DEFAULT_VIEW.latitude).abs() < f64::EPSILON);
        assert!(trigger.payloads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_search_does_nothing() {
        let mut session = session(Arc::new(MemoryApi::default()), None, Vec::new());
        assert_eq!(session.search("   ").await, SearchOutcome::EmptyQuery);
        assert!(session.surface().message().is_none());
    }

    #[tokio::test]
    async fn search_centers_and_analyzes() {
        let place = GeocodedPlace {
            latitude: 50.049,
            longitude: 19.944,
            display_name: None,
        };
        let trigger = FakeTrigger::new(
            IncidentCategory::Criminal,
            Ok(vec![incident(50.05, 19.94, "criminal")]),
        );
        let mut session = session(
            Arc::new(MemoryApi::default()),
            Some(place),
            vec![dyn_trigger(&trigger)],
        );

        let SearchOutcome::Analyzed(outcome) = session.search("Kazimierz").await else {
            panic!("expected an analysis");
        };
        assert_eq!(outcome.total(), 1);
        assert_eq!(outcome.location, "Kazimierz");

        let view = session.surface().view();
        assert!((view.zoom - SEARCH_ZOOM).abs() < f64::EPSILON);
        assert!((view.latitude - 50.049).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn start_analyzes_current_area() {
        let trigger = FakeTrigger::new(IncidentCategory::Road, Ok(Vec::new()));
        let mut session = session(
            Arc::new(MemoryApi::default()),
            None,
            vec![dyn_trigger(&trigger)],
        );

        session.start().await;

        let payloads = trigger.payloads.lock().unwrap();
        assert_eq!(payloads[0].location, CURRENT_AREA_LABEL);
        assert!((payloads[0].latitude - DEFAULT_VIEW.latitude).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn zoom_refits_every_zone() {
        let mut session = session(Arc::new(MemoryApi::default()), None, Vec::new());
        session.init(&[zone(30.0), zone(45.0)]).await;

        session.on_zoom(19.0);

        for (_, circle) in session.surface().circles() {
            assert!((circle.fill_opacity - opacity_by_zoom(19.0)).abs() < f64::EPSILON);
        }
        assert!((session.surface().view().zoom - 19.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn filter_hides_markers_and_list_entries() {
        let api = MemoryApi::with(&[
            ("criminal", vec![incident(50.06, 19.94, "criminal")]),
            (
                "road",
                vec![incident(50.07, 19.95, "road"), incident(50.08, 19.96, "flood")],
            ),
        ]);
        let mut session = session(api, None, Vec::new());
        session.init(&[]).await;
        assert_eq!(session.incident_list().len(), 3);

        session
            .apply_filter(CategoryFilter::only(&[IncidentCategory::Other]))
            .await;
        let list = session.incident_list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].category, IncidentCategory::Other);
        assert_eq!(session.surface().visible_count(), 1);

        session.apply_filter(CategoryFilter::default()).await;
        assert_eq!(session.surface().visible_count(), 3);
    }

    #[tokio::test]
    async fn widening_the_filter_loads_missing_categories() {
        let api = MemoryApi::with(&[
            ("criminal", vec![incident(50.06, 19.94, "criminal")]),
            ("road", vec![incident(50.07, 19.95, "road")]),
        ]);
        let mut session = session(api, None, Vec::new());
        session
            .apply_filter(CategoryFilter::only(&[IncidentCategory::Criminal]))
            .await;
        assert_eq!(marker_count(&session), 1);

        session
            .apply_filter(CategoryFilter::only(&[
                IncidentCategory::Criminal,
                IncidentCategory::Road,
            ]))
            .await;
        assert_eq!(marker_count(&session), 2);
    }

    #[tokio::test]
    async fn focus_and_teardown() {
        let api = MemoryApi::with(&[("criminal", vec![incident(50.06, 19.94, "criminal")])]);
        let mut session = session(api, None, Vec::new());
        session.init(&[zone(25.0)]).await;

        assert!(session.focus_incident(0));
        assert!(!session.focus_incident(7));
        let view = session.surface().view();
        assert!((view.zoom - FOCUS_ZOOM).abs() < f64::EPSILON);
        assert!(session.surface().open_popup_id().is_some());

        let map = session.into_surface();
        assert_eq!(map.visible_count(), 0);
        assert_eq!(map.markers().count() + map.circles().count(), 0);
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web storage API server for the incident map.
//!
//! Persists incident collections posted by the map client into flat JSON
//! files (see [`incident_map_storage`]) and serves them back, plus a
//! liveness probe and, when present, the static front end.

mod handlers;
pub mod interactive;

use std::path::PathBuf;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use incident_map_storage::IncidentStore;

/// Shared application state.
pub struct AppState {
    /// File-backed collection store.
    pub store: IncidentStore,
}

/// Server settings, read from the environment by [`ServerConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind (`BIND_ADDR`).
    pub bind_addr: String,
    /// TCP port (`PORT`).
    pub port: u16,
    /// Directory holding the collection files (`DATA_DIR`).
    pub data_dir: PathBuf,
    /// Directory of the static front end (`STATIC_DIR`); skipped if it
    /// doesn't exist.
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            data_dir: PathBuf::from(incident_map_storage::paths::DEFAULT_DATA_DIR),
            static_dir: PathBuf::from("frontend"),
        }
    }
}

impl ServerConfig {
    /// Builds a config from `BIND_ADDR`, `PORT`, `DATA_DIR`, and
    /// `STATIC_DIR`, falling back to [`ServerConfig::default`] values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            data_dir: incident_map_storage::paths::data_dir(),
            static_dir: std::env::var("STATIC_DIR")
                .map_or(defaults.static_dir, PathBuf::from),
        }
    }
}

/// Registers the health probe and the `/api` routes.
pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health)).service(
        web::scope("/api")
            .route("/incidents", web::get().to(handlers::load_unkeyed))
            .route("/incidents", web::post().to(handlers::save_unkeyed))
            .route("/incidents", web::delete().to(handlers::clear_all))
            .route("/incidents/{category}", web::get().to(handlers::load_incidents))
            .route("/incidents/{category}", web::post().to(handlers::save_incidents))
            .route(
                "/incidents/{category}",
                web::delete().to(handlers::clear_incidents),
            )
            .route("/culture/{key}", web::get().to(handlers::load_culture))
            .route("/culture/{key}", web::post().to(handlers::save_culture)),
    );
}

/// Starts the storage API server with settings from the environment.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    run_server_with(ServerConfig::from_env()).await
}

/// Starts the storage API server.
///
/// Creates the known collection files before binding. This is a regular
/// async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server_with(config: ServerConfig) -> std::io::Result<()> {
    let store = IncidentStore::new(&config.data_dir);
    if let Err(e) = store.ensure_known_collections().await {
        log::error!("Error ensuring incident files exist: {e}");
    }

    let state = web::Data::new(AppState { store });
    let static_dir = config.static_dir.is_dir().then(|| config.static_dir.clone());
    match &static_dir {
        Some(dir) => log::info!("Serving front end from {}", dir.display()),
        None => log::info!(
            "No front end at {}, serving API only",
            config.static_dir.display()
        ),
    }

    log::info!(
        "Backend API running on http://{}:{}",
        config.bind_addr,
        config.port
    );

    HttpServer::new(move || {
        let cors = Cors::permissive();

        let app = App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(api_routes);

        match &static_dir {
            Some(dir) => app.service(Files::new("/", dir.clone()).index_file("index.html")),
            None => app,
        }
    })
    .bind((config.bind_addr, config.port))?
    .run()
    .await
}

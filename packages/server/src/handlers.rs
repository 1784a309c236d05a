//! HTTP handler functions for the incident storage API.

use actix_web::{HttpResponse, web};
use incident_map_incident_models::{CollectionKey, InvalidKeyError};
use incident_map_server_models::{
    ApiClearResponse, ApiCultureSaveResponse, ApiError, ApiHealth, ApiSaveResponse,
};
use incident_map_storage::normalize_payload;
use serde_json::Value;

use crate::AppState;

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth::ok_at(chrono::Utc::now()))
}

/// `GET /api/incidents/{category}`
///
/// Never fails: missing or corrupt collections come back as `[]`.
pub async fn load_incidents(
    state: web::Data<AppState>,
    category: web::Path<String>,
) -> HttpResponse {
    match CollectionKey::category(&category) {
        Ok(key) => HttpResponse::Ok().json(state.store.load(&key).await),
        Err(e) => bad_key(&e),
    }
}

/// `GET /api/incidents`
pub async fn load_unkeyed(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.store.load(&CollectionKey::Unkeyed).await)
}

/// `POST /api/incidents/{category}`
///
/// Replaces the collection with the body (a record or an array of
/// records).
pub async fn save_incidents(
    state: web::Data<AppState>,
    category: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    match CollectionKey::category(&category) {
        Ok(key) => save(&state, &key, body.into_inner()).await,
        Err(e) => bad_key(&e),
    }
}

/// `POST /api/incidents`
pub async fn save_unkeyed(state: web::Data<AppState>, body: web::Json<Value>) -> HttpResponse {
    save(&state, &CollectionKey::Unkeyed, body.into_inner()).await
}

/// `DELETE /api/incidents/{category}`
pub async fn clear_incidents(
    state: web::Data<AppState>,
    category: web::Path<String>,
) -> HttpResponse {
    let key = match CollectionKey::category(&category) {
        Ok(key) => key,
        Err(e) => return bad_key(&e),
    };

    match state.store.clear(&key).await {
        Ok(()) => HttpResponse::Ok().json(ApiClearResponse {
            success: true,
            message: format!("All {key} incidents cleared"),
        }),
        Err(e) => server_error(&format!("Failed to clear {key} incidents"), &e),
    }
}

/// `DELETE /api/incidents`
///
/// Clears every known category.
pub async fn clear_all(state: web::Data<AppState>) -> HttpResponse {
    match state.store.clear_all().await {
        Ok(()) => HttpResponse::Ok().json(ApiClearResponse {
            success: true,
            message: "All incidents cleared".to_string(),
        }),
        Err(e) => server_error("Failed to clear incidents", &e),
    }
}

/// `GET /api/culture/{key}`
pub async fn load_culture(state: web::Data<AppState>, key: web::Path<String>) -> HttpResponse {
    match state.store.load_culture(&key).await {
        Ok(document) => HttpResponse::Ok().json(document),
        Err(e) => bad_key(&e),
    }
}

/// `POST /api/culture/{key}`
pub async fn save_culture(
    state: web::Data<AppState>,
    key: web::Path<String>,
    body: web::Json<Value>,
) -> HttpResponse {
    let key = key.into_inner();
    if let Err(e) = incident_map_incident_models::validate_key(&key) {
        return bad_key(&e);
    }

    match state.store.save_culture(&key, &body).await {
        Ok(()) => HttpResponse::Ok().json(ApiCultureSaveResponse { success: true, key }),
        Err(e) => server_error("Failed to save culture document", &e),
    }
}

async fn save(state: &AppState, key: &CollectionKey, payload: Value) -> HttpResponse {
    let records = normalize_payload(payload);

    match state.store.save(key, &records).await {
        Ok(total) => HttpResponse::Ok().json(ApiSaveResponse {
            success: true,
            total,
            category: key.as_category().map(str::to_string),
        }),
        Err(e) => server_error(&format!("Error saving {key} incidents"), &e),
    }
}

fn bad_key(e: &InvalidKeyError) -> HttpResponse {
    log::warn!("Rejected request: {e}");
    HttpResponse::BadRequest().json(ApiError {
        error: e.to_string(),
    })
}

fn server_error(context: &str, e: &dyn std::error::Error) -> HttpResponse {
    log::error!("{context}: {e}");
    HttpResponse::InternalServerError().json(ApiError {
        error: e.to_string(),
    })
}

//! Axum routes for the lookup service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AtlasError;
use crate::lookup::LookupMetricsSnapshot;
use crate::types::{AtlasSnapshot, BoundaryLevel};
use crate::ATLAS_SCHEMA_VERSION;

use super::state::ServiceState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for a point lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupQuery {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Optional boundary level filter (`district`, `county`, ...).
    pub layer: Option<String>,
}

/// Response for a point lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    /// Containing district, when one exists.
    pub district: Option<DistrictDto>,
    /// Schema version of the payload.
    pub schema_version: String,
}

/// Serializable district hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistrictDto {
    /// GEOID of the boundary.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Boundary level.
    pub level: String,
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "ok" when the process serves.
    pub status: String,
    /// Whether a snapshot is loaded.
    pub snapshot_loaded: bool,
}

/// Error payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error.
    pub error: String,
}

// ============================================================================
// Router
// ============================================================================

/// Build the service router.
pub fn create_router(state: ServiceState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/snapshot", get(snapshot))
        .route("/v1/lookup", get(lookup))
        .route("/v1/metrics", get(metrics))
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn healthz(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        snapshot_loaded: state.lookup.snapshot().is_some(),
    })
}

async fn snapshot(State(state): State<ServiceState>) -> Response<AtlasSnapshot> {
    match state.lookup.snapshot() {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "no snapshot loaded".to_string(),
            }),
        )),
    }
}

async fn lookup(
    State(state): State<ServiceState>,
    Query(query): Query<LookupQuery>,
) -> Response<LookupResponse> {
    let level = match query.layer.as_deref() {
        None => None,
        Some(raw) => Some(parse_level(raw).ok_or_else(|| {
            bad_request(format!("unknown layer filter: {raw}"))
        })?),
    };

    let hit = state
        .lookup
        .lookup_in_layer(query.lat, query.lon, level)
        .map_err(|e| match e {
            AtlasError::InvalidCoordinates { .. } => bad_request(e.to_string()),
            other => internal_error(other.to_string()),
        })?;

    Ok(Json(LookupResponse {
        district: hit.map(|h| DistrictDto {
            id: h.id,
            name: h.name,
            level: h.level.to_string(),
        }),
        schema_version: ATLAS_SCHEMA_VERSION.to_string(),
    }))
}

async fn metrics(State(state): State<ServiceState>) -> Json<LookupMetricsSnapshot> {
    Json(state.lookup.metrics())
}

// ============================================================================
// Helpers
// ============================================================================

type Response<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn parse_level(raw: &str) -> Option<BoundaryLevel> {
    match raw.to_lowercase().as_str() {
        "district" => Some(BoundaryLevel::District),
        "county" => Some(BoundaryLevel::County),
        "city" => Some(BoundaryLevel::City),
        "school_district" => Some(BoundaryLevel::SchoolDistrict),
        "precinct" => Some(BoundaryLevel::Precinct),
        _ => None,
    }
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

fn internal_error(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error }))
}

//! REST API
//!
//! Serves the commodity snapshot and a health endpoint with cache statistics.

use crate::{
    cache::{CacheStats, CachedSnapshotFetcher},
    error::{CommodityError, Result},
    types::Snapshot,
};
use axum::{
    Router,
    extract::State,
    http::{
        HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE,
        },
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<CachedSnapshotFetcher>,

    /// `Cache-Control: max-age` sent with snapshots (seconds)
    pub cache_control_max_age: u64,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Snapshot endpoint. HEAD is registered explicitly, otherwise the
        // method router would answer it with the GET handler.
        .route(
            "/",
            get(get_commodities)
                .head(method_not_allowed)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        // Health endpoint
        .route("/health", get(health_check))
        // Admin endpoints
        .route("/admin/cache/clear", post(clear_cache))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ))
        .with_state(state)
}

// ============================================================================
// SNAPSHOT ENDPOINT
// ============================================================================

/// GET /
///
/// Current prices for all nine commodities, served from cache when fresh.
async fn get_commodities(State(state): State<AppState>) -> Result<Response> {
    let lookup = state.fetcher.get_snapshot().await?;

    debug!(
        "Serving snapshot from {} (cached: {})",
        lookup.data.source, lookup.cached
    );

    let body = CommoditiesResponse {
        success: true,
        data: lookup.data,
        timestamp: state.fetcher.now(),
        cached: lookup.cached,
    };
    let cache_control = format!("max-age={}", state.cache_control_max_age);

    Ok(([(CACHE_CONTROL, cache_control)], Json(body)).into_response())
}

/// OPTIONS /
///
/// CORS preflight, the CORS headers come from the router layers.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Any other method on /
async fn method_not_allowed() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorResponse {
            error: "Method not allowed".to_string(),
        }),
    )
}

// ============================================================================
// HEALTH ENDPOINT
// ============================================================================

/// GET /health
///
/// Liveness plus cache statistics
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        cache: state.fetcher.stats().await,
        timestamp: state.fetcher.now(),
    })
}

// ============================================================================
// ADMIN ENDPOINTS
// ============================================================================

/// POST /admin/cache/clear
///
/// Drop the cached snapshot, the next GET / regenerates
async fn clear_cache(State(state): State<AppState>) -> Json<AdminResponse> {
    state.fetcher.clear().await;
    info!("Snapshot cache cleared via admin endpoint");

    Json(AdminResponse {
        success: true,
        message: "Cache cleared successfully".to_string(),
    })
}

// ============================================================================
// REQUEST/RESPONSE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CommoditiesResponse {
    pub success: bool,
    pub data: Arc<Snapshot>,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub cache: CacheStats,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

impl IntoResponse for CommodityError {
    fn into_response(self) -> Response {
        error!("Request failed: {}", self);

        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

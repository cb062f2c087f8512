//! Operational handlers: health, ping, cache status, reload, OpenAPI document.

use crate::metadata::{self, CacheStatus, HealthStatus, ReloadResult};
use crate::openapi;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

#[utoipa::path(
    get,
    path = "/dt",
    tag = "operational",
    responses((status = 200, description = "Service and database status", body = HealthStatus))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let database = state.db.ping().await;
    let version = if database {
        state.db.db_version().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read server version");
            "unknown".to_string()
        })
    } else {
        "unknown".to_string()
    };
    Json(HealthStatus {
        status: if database { "healthy" } else { "degraded" }.to_string(),
        timestamp: Utc::now(),
        version,
        uptime: state.started_at.elapsed().as_secs_f64(),
        database,
        environment: state.config.environment.clone(),
    })
}

#[utoipa::path(
    get,
    path = "/dt/ping",
    tag = "operational",
    responses((status = 200, description = "Always `pong`", body = String, content_type = "text/plain"))
)]
pub async fn ping() -> &'static str {
    "pong"
}

#[utoipa::path(
    get,
    path = "/dt/cache",
    tag = "operational",
    responses((status = 200, description = "Counts of the current snapshot", body = CacheStatus))
)]
pub async fn cache_status(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(metadata::cache_status(&state.cache.snapshot()))
}

/// Rebuild the model cache from the live catalog. On failure the previous snapshot keeps serving.
#[utoipa::path(
    post,
    path = "/dt/clear-cache",
    tag = "operational",
    responses(
        (status = 200, description = "Cache reloaded", body = ReloadResult),
        (status = 500, description = "Reload failed; previous snapshot kept", body = ReloadResult)
    )
)]
pub async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    match state.cache.reload().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(ReloadResult {
                status: "success".into(),
                message: format!("Cache cleared and reloaded (generation {})", snapshot.generation),
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ReloadResult {
                status: "error".into(),
                message: e.to_string(),
            }),
        ),
    }
}

pub async fn openapi_json(State(state): State<AppState>) -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::document(&state.cache.snapshot(), &state.config.info))
}

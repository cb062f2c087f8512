//! `/dt` routes: health, cache control, catalog metadata, OpenAPI document.

use crate::handlers::fallback::method_not_allowed;
use crate::handlers::health::{cache_status, clear_cache, health, openapi_json, ping};
use crate::handlers::metadata::{get_enums, get_functions, get_schemas, get_tables, get_views};
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn metadata_routes(state: AppState) -> Router {
    Router::new()
        .route("/dt", get(health).fallback(method_not_allowed))
        .route("/dt/ping", get(ping).fallback(method_not_allowed))
        .route("/dt/cache", get(cache_status).fallback(method_not_allowed))
        .route("/dt/clear-cache", post(clear_cache).fallback(method_not_allowed))
        .route("/dt/openapi.json", get(openapi_json).fallback(method_not_allowed))
        .route("/dt/schemas", get(get_schemas).fallback(method_not_allowed))
        .route("/dt/:schema/tables", get(get_tables).fallback(method_not_allowed))
        .route("/dt/:schema/views", get(get_views).fallback(method_not_allowed))
        .route("/dt/:schema/enums", get(get_enums).fallback(method_not_allowed))
        .route("/dt/:schema/functions", get(get_functions).fallback(method_not_allowed))
        .with_state(state)
}

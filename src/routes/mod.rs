//! Route synthesis and the axum routers built on it.

mod data;
mod metadata;
mod synth;

pub use data::data_routes;
pub use metadata::metadata_routes;
pub use synth::{EntityKind, Operation, RejectedRoute, RouteBinding, RouteSynthesizer, RouteTable};

use crate::handlers::fallback::not_found;
use crate::state::AppState;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this size are rejected with 413.
pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

/// Every synthesized data route plus the `/dt` routes. Unmatched paths get an enveloped 404.
pub fn forge_routes(state: AppState) -> Router {
    Router::new()
        .merge(metadata_routes(state.clone()))
        .merge(data_routes(state))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES)))
}

//! Data routes for tables, views and functions.
//! Entities are resolved per request against the current snapshot, so reloads need no router rebuild.
//! The segment `fn` is reserved: key routes of a table named `fn` are not reachable.

use crate::handlers::entity::{create, delete as delete_handler, list, read, update};
use crate::handlers::fallback::method_not_allowed;
use crate::handlers::function::call;
use crate::state::AppState;
use axum::{routing::get, routing::post, Router};

pub fn data_routes(state: AppState) -> Router {
    Router::new()
        .route("/:schema/fn/:function", post(call).fallback(method_not_allowed))
        .route("/:schema/:entity", get(list).post(create).fallback(method_not_allowed))
        .route(
            "/:schema/:entity/:id",
            get(read).put(update).delete(delete_handler).fallback(method_not_allowed),
        )
        .with_state(state)
}

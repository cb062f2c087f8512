//! Stored function invocation.

use crate::catalog::cache_key;
use crate::error::AppError;
use crate::routes::Operation;
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::Value;

/// POST /:schema/fn/:function. Body is an object (by name) or an array (by position); empty body means no arguments.
pub async fn call(
    State(state): State<AppState>,
    Path((schema, function)): Path<(String, String)>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, AppError> {
    let snapshot = state.cache.snapshot();
    snapshot.routes.resolve(&schema, &function, Operation::Call)?;
    let key = cache_key(&schema, &function);
    let model = snapshot.functions.get(&key).ok_or(AppError::NotFound(key))?;
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let mut session = state.db.session().await?;
    let result = CrudService::call(session.conn(), model, body).await?;
    Ok(Json(result))
}

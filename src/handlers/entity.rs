//! Table and view handlers: list, create, read, update, delete.

use crate::catalog::cache_key;
use crate::error::AppError;
use crate::model::{CacheSnapshot, TableModel};
use crate::response::{success_created, success_many, success_one};
use crate::routes::{EntityKind, Operation};
use crate::service::{parse_key, CrudService, ListQuery};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn table_model<'a>(snapshot: &'a CacheSnapshot, schema: &str, name: &str) -> Result<&'a TableModel, AppError> {
    let key = cache_key(schema, name);
    snapshot.tables.get(&key).ok_or(AppError::NotFound(key))
}

pub async fn list(
    State(state): State<AppState>,
    Path((schema, entity)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.cache.snapshot();
    let kind = snapshot.routes.resolve(&schema, &entity, Operation::List)?;
    let query = ListQuery::parse(&params)?;
    let mut session = state.db.session().await?;
    let rows = match kind {
        EntityKind::Table => {
            let table = table_model(&snapshot, &schema, &entity)?;
            CrudService::list_table(session.conn(), table, &query).await?
        }
        EntityKind::View => {
            let key = cache_key(&schema, &entity);
            let view = snapshot.views.get(&key).ok_or(AppError::NotFound(key))?;
            CrudService::list_view(session.conn(), view, &query).await?
        }
        EntityKind::Function => return Err(AppError::NotFound(cache_key(&schema, &entity))),
    };
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path((schema, entity)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.cache.snapshot();
    snapshot.routes.resolve(&schema, &entity, Operation::Create)?;
    let table = table_model(&snapshot, &schema, &entity)?;
    let body = body_to_map(body)?;
    let mut session = state.db.session().await?;
    let row = CrudService::create(session.conn(), table, &body).await?;
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((schema, entity, id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.cache.snapshot();
    snapshot.routes.resolve(&schema, &entity, Operation::Read)?;
    let table = table_model(&snapshot, &schema, &entity)?;
    let key = parse_key(&id, &table.key_fields())?;
    let mut session = state.db.session().await?;
    let row = CrudService::read(session.conn(), table, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(id))?;
    Ok(success_one(row))
}

/// Partial update: only the fields present in the body change.
pub async fn update(
    State(state): State<AppState>,
    Path((schema, entity, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.cache.snapshot();
    snapshot.routes.resolve(&schema, &entity, Operation::Update)?;
    let table = table_model(&snapshot, &schema, &entity)?;
    let key = parse_key(&id, &table.key_fields())?;
    let body = body_to_map(body)?;
    let mut session = state.db.session().await?;
    let row = CrudService::update(session.conn(), table, &key, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(id))?;
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((schema, entity, id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let snapshot = state.cache.snapshot();
    snapshot.routes.resolve(&schema, &entity, Operation::Delete)?;
    let table = table_model(&snapshot, &schema, &entity)?;
    let key = parse_key(&id, &table.key_fields())?;
    let mut session = state.db.session().await?;
    CrudService::delete(session.conn(), table, &key)
        .await?
        .ok_or_else(|| AppError::NotFound(id))?;
    Ok(StatusCode::NO_CONTENT)
}

//! Metadata handlers under `/dt`: schemas, tables, views, enums, functions.

use crate::error::AppError;
use crate::metadata::{self, EnumMetadata, FunctionMetadata, SchemaMetadata, TableMetadata, ViewMetadata};
use crate::model::CacheSnapshot;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

/// Snapshot that contains `schema`, or 404.
fn snapshot_with(state: &AppState, schema: &str) -> Result<Arc<CacheSnapshot>, AppError> {
    let snapshot = state.cache.snapshot();
    if !snapshot.has_schema(schema) {
        return Err(AppError::NotFound(format!("schema '{}'", schema)));
    }
    Ok(snapshot)
}

#[utoipa::path(
    get,
    path = "/dt/schemas",
    tag = "metadata",
    responses((status = 200, description = "Loaded schemas with their tables", body = [SchemaMetadata]))
)]
pub async fn get_schemas(State(state): State<AppState>) -> Json<Vec<SchemaMetadata>> {
    Json(metadata::schemas(&state.cache.snapshot()))
}

#[utoipa::path(
    get,
    path = "/dt/{schema}/tables",
    tag = "metadata",
    params(("schema" = String, Path, description = "Schema name")),
    responses(
        (status = 200, description = "Tables of the schema", body = [TableMetadata]),
        (status = 404, description = "Schema not loaded")
    )
)]
pub async fn get_tables(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> Result<Json<Vec<TableMetadata>>, AppError> {
    let snapshot = snapshot_with(&state, &schema)?;
    Ok(Json(metadata::tables(&snapshot, &schema)))
}

#[utoipa::path(
    get,
    path = "/dt/{schema}/views",
    tag = "metadata",
    params(("schema" = String, Path, description = "Schema name")),
    responses(
        (status = 200, description = "Views of the schema", body = [ViewMetadata]),
        (status = 404, description = "Schema not loaded")
    )
)]
pub async fn get_views(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> Result<Json<Vec<ViewMetadata>>, AppError> {
    let snapshot = snapshot_with(&state, &schema)?;
    Ok(Json(metadata::views(&snapshot, &schema)))
}

#[utoipa::path(
    get,
    path = "/dt/{schema}/enums",
    tag = "metadata",
    params(("schema" = String, Path, description = "Schema name")),
    responses(
        (status = 200, description = "Enum types of the schema", body = [EnumMetadata]),
        (status = 404, description = "Schema not loaded")
    )
)]
pub async fn get_enums(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> Result<Json<Vec<EnumMetadata>>, AppError> {
    let snapshot = snapshot_with(&state, &schema)?;
    Ok(Json(metadata::enums(&snapshot, &schema)))
}

#[utoipa::path(
    get,
    path = "/dt/{schema}/functions",
    tag = "metadata",
    params(("schema" = String, Path, description = "Schema name")),
    responses(
        (status = 200, description = "Functions of the schema", body = [FunctionMetadata]),
        (status = 404, description = "Schema not loaded")
    )
)]
pub async fn get_functions(
    State(state): State<AppState>,
    Path(schema): Path<String>,
) -> Result<Json<Vec<FunctionMetadata>>, AppError> {
    let snapshot = snapshot_with(&state, &schema)?;
    Ok(Json(metadata::functions(&snapshot, &schema)))
}

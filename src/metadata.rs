//! Metadata documents computed from a cache snapshot.

use crate::catalog::{ColumnDescriptor, ReturnShape};
use crate::model::CacheSnapshot;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ColumnRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// Declared SQL type.
    #[serde(rename = "type")]
    pub sql_type: String,
    pub nullable: bool,
    #[serde(rename = "isPrimaryKey")]
    pub is_primary_key: bool,
    #[serde(rename = "isEnum")]
    pub is_enum: bool,
    pub references: Option<ColumnRef>,
}

impl From<&ColumnDescriptor> for ColumnMetadata {
    fn from(c: &ColumnDescriptor) -> Self {
        ColumnMetadata {
            name: c.name.clone(),
            sql_type: c.sql_type.clone(),
            nullable: c.nullable,
            is_primary_key: c.is_primary_key,
            is_enum: c.is_enum,
            references: c.references.as_ref().map(|r| ColumnRef {
                schema: r.schema.clone(),
                table: r.table.clone(),
                column: r.column.clone(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct TableMetadata {
    pub name: String,
    pub schema: String,
    pub columns: Vec<ColumnMetadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct SchemaMetadata {
    pub name: String,
    /// Keyed by table name.
    pub tables: BTreeMap<String, TableMetadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ViewColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ViewMetadata {
    pub name: String,
    pub schema: String,
    pub view_columns: Vec<ViewColumnMetadata>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct EnumMetadata {
    pub name: String,
    pub schema: String,
    pub values: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FunctionParamMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    pub has_default: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct FunctionMetadata {
    pub name: String,
    pub schema: String,
    pub parameters: Vec<FunctionParamMetadata>,
    pub return_type: String,
    /// One of `scalar`, `row`, `row_set`, `table`.
    pub returns: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct HealthStatus {
    /// `healthy` or `degraded`.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Database server version.
    pub version: String,
    /// Seconds since startup.
    pub uptime: f64,
    pub database: bool,
    pub environment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CacheStatus {
    /// When the current snapshot was built.
    pub last_updated: DateTime<Utc>,
    pub generation: u64,
    pub total_items: usize,
    pub tables_cached: usize,
    pub views_cached: usize,
    pub enums_cached: usize,
    pub functions_cached: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ReloadResult {
    /// `success` or `error`.
    pub status: String,
    pub message: String,
}

pub fn tables(snapshot: &CacheSnapshot, schema: &str) -> Vec<TableMetadata> {
    snapshot
        .tables_in(schema)
        .map(|t| TableMetadata {
            name: t.descriptor.name.clone(),
            schema: t.descriptor.schema.clone(),
            columns: t.descriptor.columns.iter().map(ColumnMetadata::from).collect(),
        })
        .collect()
}

/// Every snapshot schema with its tables, in configuration order.
pub fn schemas(snapshot: &CacheSnapshot) -> Vec<SchemaMetadata> {
    snapshot
        .schemas
        .iter()
        .map(|s| SchemaMetadata {
            name: s.clone(),
            tables: tables(snapshot, s).into_iter().map(|t| (t.name.clone(), t)).collect(),
        })
        .collect()
}

pub fn views(snapshot: &CacheSnapshot, schema: &str) -> Vec<ViewMetadata> {
    snapshot
        .views_in(schema)
        .map(|v| ViewMetadata {
            name: v.descriptor.name.clone(),
            schema: v.descriptor.schema.clone(),
            view_columns: v
                .descriptor
                .columns
                .iter()
                .map(|c| ViewColumnMetadata {
                    name: c.name.clone(),
                    sql_type: c.sql_type.clone(),
                    nullable: c.nullable,
                })
                .collect(),
        })
        .collect()
}

pub fn enums(snapshot: &CacheSnapshot, schema: &str) -> Vec<EnumMetadata> {
    snapshot
        .enums_in(schema)
        .map(|e| EnumMetadata {
            name: e.name.clone(),
            schema: e.schema.clone(),
            values: e.values.clone(),
        })
        .collect()
}

pub fn functions(snapshot: &CacheSnapshot, schema: &str) -> Vec<FunctionMetadata> {
    snapshot
        .functions_in(schema)
        .map(|f| {
            let d = &f.descriptor;
            FunctionMetadata {
                name: d.name.clone(),
                schema: d.schema.clone(),
                parameters: f
                    .params
                    .fields
                    .iter()
                    .map(|p| FunctionParamMetadata {
                        name: p.name.clone(),
                        sql_type: p.sql_type.clone(),
                        has_default: p.has_default,
                    })
                    .collect(),
                return_type: d.return_type.clone(),
                returns: return_shape_name(d.returns).to_string(),
            }
        })
        .collect()
}

fn return_shape_name(shape: ReturnShape) -> &'static str {
    match shape {
        ReturnShape::Scalar => "scalar",
        ReturnShape::Row => "row",
        ReturnShape::RowSet => "row_set",
        ReturnShape::Table => "table",
    }
}

pub fn cache_status(snapshot: &CacheSnapshot) -> CacheStatus {
    let counts = snapshot.counts();
    CacheStatus {
        last_updated: snapshot.built_at,
        generation: snapshot.generation,
        total_items: counts.total(),
        tables_cached: counts.tables,
        views_cached: counts.views,
        enums_cached: counts.enums,
        functions_cached: counts.functions,
    }
}

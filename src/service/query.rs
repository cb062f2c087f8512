//! Query-string and path parsing for list and key routes.

use crate::error::AppError;
use crate::model::Field;
use crate::sql::{Filter, FilterOp};
use serde_json::Value;
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub limit: u32,
    pub offset: u32,
}

impl ListQuery {
    /// `limit` and `offset` are reserved; every other key is a filter (`col` or `col__op`).
    /// Limit is clamped to `MAX_LIMIT`; non-numeric limit or offset is a bad request.
    pub fn parse(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let mut limit = DEFAULT_LIMIT;
        let mut offset = 0;
        let mut filters = Vec::new();
        for (k, v) in params {
            match k.as_str() {
                "limit" => {
                    limit = v
                        .parse::<u32>()
                        .map_err(|_| AppError::BadRequest(format!("invalid limit: {}", v)))?
                        .min(MAX_LIMIT);
                }
                "offset" => {
                    offset = v
                        .parse()
                        .map_err(|_| AppError::BadRequest(format!("invalid offset: {}", v)))?;
                }
                _ => {
                    let (column, op) = FilterOp::parse_key(k);
                    filters.push(Filter {
                        column: column.to_string(),
                        op,
                        value: Value::String(v.clone()),
                    });
                }
            }
        }
        // HashMap order is arbitrary; keep parameter numbering stable.
        filters.sort_by(|a, b| a.column.cmp(&b.column).then((a.op as u8).cmp(&(b.op as u8))));
        Ok(ListQuery {
            filters,
            limit,
            offset,
        })
    }
}

/// Split the `{id}` path segment into one value per key column (comma-separated for composite keys).
pub fn parse_key(raw: &str, key: &[&Field]) -> Result<Vec<Value>, AppError> {
    let parts: Vec<&str> = if key.len() == 1 {
        vec![raw]
    } else {
        raw.split(',').collect()
    };
    if parts.len() != key.len() {
        let names: Vec<&str> = key.iter().map(|f| f.name.as_str()).collect();
        return Err(AppError::BadRequest(format!(
            "expected {} key values ({}), got {}",
            key.len(),
            names.join(","),
            parts.len()
        )));
    }
    Ok(parts.into_iter().map(|p| Value::String(p.to_string())).collect())
}

//! Route synthesis: which operations each cached entity exposes, and which were refused.

use crate::catalog::cache_key;
use crate::error::{AppError, ConfigError};
use crate::model::CacheSnapshot;
use axum::http::Method;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Table,
    View,
    Function,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Create,
    Read,
    Update,
    Delete,
    Call,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Call => "call",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Operation::List | Operation::Read => Method::GET,
            Operation::Create | Operation::Call => Method::POST,
            Operation::Update => Method::PUT,
            Operation::Delete => Method::DELETE,
        }
    }
}

/// One exposed operation on one entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RouteBinding {
    pub key: String,
    pub kind: EntityKind,
    pub operation: Operation,
    /// OpenAPI-style path, e.g. `/pharma/inventory/{id}`.
    pub path: String,
}

/// An operation withheld at synthesis time; requests for it get 405.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedRoute {
    pub key: String,
    pub operation: Operation,
    pub reason: ConfigError,
}

#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    bindings: Vec<RouteBinding>,
    rejected: Vec<RejectedRoute>,
    kinds: HashMap<String, EntityKind>,
}

impl RouteTable {
    fn bind(&mut self, key: String, kind: EntityKind, operation: Operation, path: String) {
        self.kinds.insert(key.clone(), kind);
        self.bindings.push(RouteBinding {
            key,
            kind,
            operation,
            path,
        });
    }

    pub fn bindings(&self) -> &[RouteBinding] {
        &self.bindings
    }

    pub fn rejected(&self) -> &[RejectedRoute] {
        &self.rejected
    }

    /// Check that `schema.name` exposes `operation`.
    ///
    /// Unknown entity → `NotFound`; withheld or unsupported operation → `SchemaMismatch` (405).
    pub fn resolve(&self, schema: &str, name: &str, operation: Operation) -> Result<EntityKind, AppError> {
        let key = cache_key(schema, name);
        let Some(kind) = self.kinds.get(&key).copied() else {
            return Err(AppError::NotFound(key));
        };
        if self.bindings.iter().any(|b| b.key == key && b.operation == operation) {
            return Ok(kind);
        }
        if let Some(r) = self.rejected.iter().find(|r| r.key == key && r.operation == operation) {
            return Err(AppError::SchemaMismatch(r.reason.clone()));
        }
        Err(AppError::SchemaMismatch(ConfigError::UnsupportedOperation {
            entity: key,
            operation: operation.as_str(),
        }))
    }
}

pub struct RouteSynthesizer;

impl RouteSynthesizer {
    /// Derive the route table from a snapshot. Tables without a primary key get list and create only.
    pub fn synthesize(snapshot: &CacheSnapshot) -> RouteTable {
        let mut table = RouteTable::default();

        for (key, t) in &snapshot.tables {
            let d = &t.descriptor;
            let base = format!("/{}/{}", d.schema, d.name);
            table.bind(key.clone(), EntityKind::Table, Operation::List, base.clone());
            table.bind(key.clone(), EntityKind::Table, Operation::Create, base.clone());
            for op in [Operation::Read, Operation::Update, Operation::Delete] {
                if t.has_primary_key() {
                    table.bind(key.clone(), EntityKind::Table, op, format!("{}/{{id}}", base));
                } else {
                    let reason = ConfigError::NoPrimaryKey {
                        schema: d.schema.clone(),
                        table: d.name.clone(),
                        operation: op.as_str(),
                    };
                    tracing::warn!(table = %key, operation = op.as_str(), "{}", reason);
                    table.rejected.push(RejectedRoute {
                        key: key.clone(),
                        operation: op,
                        reason,
                    });
                }
            }
        }

        for (key, v) in &snapshot.views {
            let d = &v.descriptor;
            table.bind(key.clone(), EntityKind::View, Operation::List, format!("/{}/{}", d.schema, d.name));
        }

        for (key, f) in &snapshot.functions {
            let d = &f.descriptor;
            table.bind(key.clone(), EntityKind::Function, Operation::Call, format!("/{}/fn/{}", d.schema, d.name));
        }

        table
    }
}

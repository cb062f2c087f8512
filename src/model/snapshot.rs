//! Immutable snapshot of every model derived from one catalog walk.

use crate::catalog::{Catalog, EnumDescriptor};
use crate::mapping::TypeMapper;
use crate::model::entity::{FunctionModel, TableModel, ViewModel};
use crate::model::SampleProvider;
use crate::routes::{RouteSynthesizer, RouteTable};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct CacheSnapshot {
    /// Included schemas present in the live catalog, in configuration order.
    pub schemas: Vec<String>,
    pub tables: BTreeMap<String, TableModel>,
    pub views: BTreeMap<String, ViewModel>,
    pub enums: BTreeMap<String, EnumDescriptor>,
    pub functions: BTreeMap<String, FunctionModel>,
    pub routes: RouteTable,
    pub built_at: DateTime<Utc>,
    /// 1 for the initial load, incremented on every successful reload.
    pub generation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub tables: usize,
    pub views: usize,
    pub enums: usize,
    pub functions: usize,
}

impl SnapshotCounts {
    pub fn total(&self) -> usize {
        self.tables + self.views + self.enums + self.functions
    }
}

impl CacheSnapshot {
    /// Derive all models from `catalog`. Views get one sample row each; sample failures degrade, never fail.
    pub async fn build(catalog: Catalog, samples: &dyn SampleProvider, generation: u64) -> CacheSnapshot {
        let mapper = TypeMapper::new(&catalog.enums);

        let mut tables = BTreeMap::new();
        for t in catalog.tables {
            tables.insert(t.key(), TableModel::build(t, &mapper));
        }

        let mut views = BTreeMap::new();
        for v in catalog.views {
            let sample = match samples.sample_row(&v.schema, &v.name).await {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(view = %v.key(), error = %e, "could not fetch sample row; JSON columns stay untyped");
                    None
                }
            };
            views.insert(v.key(), ViewModel::build(v, &mapper, sample.as_ref()));
        }

        let enums = catalog.enums.into_iter().map(|e| (e.key(), e)).collect();

        let mut functions = BTreeMap::new();
        for f in catalog.functions {
            let key = f.key();
            if tables.contains_key(&key) || views.contains_key(&key) || functions.contains_key(&key) {
                tracing::warn!(function = %key, "function name collides with another entity; skipped");
                continue;
            }
            functions.insert(key, FunctionModel::build(f, &mapper));
        }

        let mut snapshot = CacheSnapshot {
            schemas: catalog.schemas,
            tables,
            views,
            enums,
            functions,
            routes: RouteTable::default(),
            built_at: Utc::now(),
            generation,
        };
        snapshot.routes = RouteSynthesizer::synthesize(&snapshot);
        snapshot
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.schemas.iter().any(|s| s == schema)
    }

    pub fn counts(&self) -> SnapshotCounts {
        SnapshotCounts {
            tables: self.tables.len(),
            views: self.views.len(),
            enums: self.enums.len(),
            functions: self.functions.len(),
        }
    }

    pub fn tables_in<'a>(&'a self, schema: &'a str) -> impl Iterator<Item = &'a TableModel> + 'a {
        self.tables.values().filter(move |t| t.descriptor.schema == schema)
    }

    pub fn views_in<'a>(&'a self, schema: &'a str) -> impl Iterator<Item = &'a ViewModel> + 'a {
        self.views.values().filter(move |v| v.descriptor.schema == schema)
    }

    pub fn enums_in<'a>(&'a self, schema: &'a str) -> impl Iterator<Item = &'a EnumDescriptor> + 'a {
        self.enums.values().filter(move |e| e.schema == schema)
    }

    pub fn functions_in<'a>(&'a self, schema: &'a str) -> impl Iterator<Item = &'a FunctionModel> + 'a {
        self.functions.values().filter(move |f| f.descriptor.schema == schema)
    }

    /// Every cache key across tables, views and functions.
    pub fn entity_keys(&self) -> Vec<&str> {
        self.tables
            .keys()
            .chain(self.views.keys())
            .chain(self.functions.keys())
            .map(String::as_str)
            .collect()
    }

    /// Per-schema summary at info level.
    pub fn log_summary(&self) {
        for schema in &self.schemas {
            tracing::info!(
                schema = %schema,
                tables = self.tables_in(schema).count(),
                views = self.views_in(schema).count(),
                enums = self.enums_in(schema).count(),
                functions = self.functions_in(schema).count(),
                "schema loaded"
            );
        }
        let counts = self.counts();
        tracing::info!(
            generation = self.generation,
            total = counts.total(),
            routes = self.routes.bindings().len(),
            rejected = self.routes.rejected().len(),
            "model cache ready"
        );
    }
}

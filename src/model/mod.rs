//! Per-entity models and the reloadable cache that holds them.

pub mod cache;
pub mod entity;
pub mod shape;
pub mod snapshot;

pub use cache::ModelCache;
pub use entity::{FunctionModel, ModelPair, TableModel, ViewModel};
pub use shape::{Field, Shape, ValidationMode};
pub use snapshot::{CacheSnapshot, SnapshotCounts};

use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// One sample row of a relation, used to shape JSON columns of views.
#[async_trait]
pub trait SampleProvider: Send + Sync {
    /// `Ok(None)` when the relation is empty.
    async fn sample_row(&self, schema: &str, relation: &str) -> Result<Option<Value>, AppError>;
}

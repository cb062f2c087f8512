//! Live catalog introspection.

pub mod loader;
pub mod types;

pub use loader::SchemaCatalogLoader;
pub use types::*;

use crate::error::AppError;
use async_trait::async_trait;

/// Source of catalog descriptors. The PostgreSQL implementation is [`SchemaCatalogLoader`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Walk the catalog for `filter.include_schemas`. Unreachable database is `AppError::Connectivity`.
    async fn load(&self, filter: &CatalogFilter) -> Result<Catalog, AppError>;
}

//! db-forge: catalog-driven REST backend library.
//!
//! Introspects a PostgreSQL catalog, maps column types to semantic descriptors,
//! caches per-entity models in an atomically swappable snapshot and serves
//! CRUD, view, function and metadata routes synthesized from it.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod mapping;
pub mod metadata;
pub mod model;
pub mod openapi;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;

pub use catalog::{Catalog, CatalogFilter, CatalogSource, SchemaCatalogLoader};
pub use config::{load_from_env, ForgeConfig};
pub use db::{ConnectionManager, Session};
pub use error::{AppError, ConfigError};
pub use logging::init_tracing;
pub use mapping::{TypeDescriptor, TypeMapper};
pub use model::{CacheSnapshot, ModelCache, SampleProvider};
pub use routes::{forge_routes, RouteSynthesizer, RouteTable};
pub use service::CrudService;
pub use state::AppState;

//! Shared application state for all routes. The model cache is reloadable at runtime.

use crate::config::ForgeConfig;
use crate::db::ConnectionManager;
use crate::model::ModelCache;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub db: ConnectionManager,
    /// Handlers take one snapshot per request; `/dt/clear-cache` swaps it.
    pub cache: Arc<ModelCache>,
    pub config: Arc<ForgeConfig>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: ConnectionManager, cache: Arc<ModelCache>, config: ForgeConfig) -> Self {
        AppState {
            db,
            cache,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }
}

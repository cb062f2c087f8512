//! Example consumer: serves every schema listed in FORGE_INCLUDE_SCHEMAS.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Configuration comes from the environment or a `.env` file (DB_HOST, DB_NAME, DB_USER, ...).

use db_forge::{
    forge_routes, init_tracing, load_from_env, AppState, ConnectionManager, ModelCache, SchemaCatalogLoader,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("db_forge=info,example_consumer=info");

    let config = load_from_env()?;
    let db = ConnectionManager::connect(&config.db).await?;
    let cache = ModelCache::load(
        Arc::new(SchemaCatalogLoader::new(db.clone())),
        Arc::new(db.clone()),
        config.catalog_filter(),
    )
    .await?;
    for rejected in cache.snapshot().routes.rejected() {
        tracing::warn!(entity = %rejected.key, operation = rejected.operation.as_str(), "route not synthesized: {}", rejected.reason);
    }

    let state = AppState::new(db, Arc::new(cache), config);
    let app = forge_routes(state);

    let bind = std::env::var("FORGE_BIND").unwrap_or_else(|_| "127.0.0.1:8000".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("db-forge listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

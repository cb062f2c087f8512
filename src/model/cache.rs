//! Atomically swappable snapshot of all models.
//!
//! Readers take an `Arc<CacheSnapshot>` and keep using it for the whole request,
//! so a concurrent reload never mixes two generations in one response.

use crate::catalog::{CatalogFilter, CatalogSource};
use crate::error::AppError;
use crate::model::snapshot::CacheSnapshot;
use crate::model::SampleProvider;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

pub struct ModelCache {
    source: Arc<dyn CatalogSource>,
    samples: Arc<dyn SampleProvider>,
    filter: CatalogFilter,
    current: RwLock<Arc<CacheSnapshot>>,
    /// Serializes reloads; readers never take it.
    reload_lock: Mutex<()>,
}

impl ModelCache {
    /// Initial load. Fails when the catalog cannot be read.
    pub async fn load(
        source: Arc<dyn CatalogSource>,
        samples: Arc<dyn SampleProvider>,
        filter: CatalogFilter,
    ) -> Result<Self, AppError> {
        let catalog = source.load(&filter).await?;
        let snapshot = CacheSnapshot::build(catalog, samples.as_ref(), 1).await;
        snapshot.log_summary();
        Ok(ModelCache {
            source,
            samples,
            filter,
            current: RwLock::new(Arc::new(snapshot)),
            reload_lock: Mutex::new(()),
        })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Rebuild from the live catalog and publish the result. On failure the previous snapshot stays.
    pub async fn reload(&self) -> Result<Arc<CacheSnapshot>, AppError> {
        let _guard = self.reload_lock.lock().await;
        let generation = self.snapshot().generation + 1;
        tracing::info!(generation, "reloading model cache");

        let catalog = match self.source.load(&self.filter).await {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "reload failed; keeping previous snapshot");
                return Err(AppError::Reload(e.to_string()));
            }
        };
        let next = Arc::new(CacheSnapshot::build(catalog, self.samples.as_ref(), generation).await);
        next.log_summary();

        match self.current.write() {
            Ok(mut guard) => *guard = Arc::clone(&next),
            Err(poisoned) => *poisoned.into_inner() = Arc::clone(&next),
        }
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, ColumnDescriptor, TableDescriptor};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Scripted {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl CatalogSource for Scripted {
        async fn load(&self, filter: &CatalogFilter) -> Result<Catalog, AppError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Connectivity("connection refused".into()));
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut id = ColumnDescriptor::new("id", "integer", false);
            id.is_primary_key = true;
            let mut tables = vec![TableDescriptor {
                schema: "public".into(),
                name: "pharmacy".into(),
                columns: vec![id.clone()],
                primary_key: vec!["id".into()],
            }];
            if n > 0 {
                tables.push(TableDescriptor {
                    schema: "public".into(),
                    name: "medicine".into(),
                    columns: vec![id],
                    primary_key: vec!["id".into()],
                });
            }
            Ok(Catalog {
                schemas: filter.include_schemas.clone(),
                tables,
                ..Catalog::default()
            })
        }
    }

    struct NoSamples;

    #[async_trait]
    impl SampleProvider for NoSamples {
        async fn sample_row(&self, _: &str, _: &str) -> Result<Option<Value>, AppError> {
            Ok(None)
        }
    }

    async fn cache() -> (Arc<Scripted>, ModelCache) {
        let source = Arc::new(Scripted {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        });
        let filter = CatalogFilter {
            include_schemas: vec!["public".into()],
            exclude_tables: Vec::new(),
        };
        let cache = ModelCache::load(source.clone(), Arc::new(NoSamples), filter)
            .await
            .unwrap();
        (source, cache)
    }

    #[tokio::test]
    async fn reload_publishes_new_tables_and_keeps_old_readers_intact() {
        let (_, cache) = cache().await;
        let before = cache.snapshot();
        assert_eq!(before.tables.len(), 1);

        let after = cache.reload().await.unwrap();
        assert_eq!(after.tables.len(), 2);
        assert_eq!(after.generation, 2);
        assert_eq!(cache.snapshot().generation, 2);
        assert_eq!(before.tables.len(), 1);
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_snapshot() {
        let (source, cache) = cache().await;
        source.fail.store(true, Ordering::SeqCst);
        let err = cache.reload().await.unwrap_err();
        assert!(matches!(err, AppError::Reload(_)));
        let snap = cache.snapshot();
        assert_eq!(snap.generation, 1);
        assert!(snap.tables.contains_key("public.pharmacy"));
    }

    #[tokio::test]
    async fn concurrent_reloads_are_serialized() {
        let (_, cache) = cache().await;
        let cache = Arc::new(cache);
        let (a, b) = tokio::join!(cache.reload(), cache.reload());
        let mut gens = vec![a.unwrap().generation, b.unwrap().generation];
        gens.sort();
        assert_eq!(gens, vec![2, 3]);
    }
}

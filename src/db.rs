//! Pooled PostgreSQL access: scoped sessions, liveness, and sample rows.

use crate::config::{DbConfig, PoolConfig};
use crate::error::AppError;
use crate::model::SampleProvider;
use crate::sql::qualified_table;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgConnection, PgPool, Postgres};
use std::time::Duration;

/// Owns the connection pool. Cheap to clone; every clone shares the pool.
#[derive(Clone)]
pub struct ConnectionManager {
    pool: PgPool,
    checkout_timeout: Duration,
}

/// One checked-out connection. Returned to the pool when dropped, on every exit path.
pub struct Session {
    conn: PoolConnection<Postgres>,
}

impl Session {
    pub fn conn(&mut self) -> &mut PgConnection {
        &mut self.conn
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub max_connections: u32,
}

impl ConnectionManager {
    pub fn connect_options(config: &DbConfig) -> PgConnectOptions {
        let opts = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .application_name("db-forge");
        if config.echo {
            opts
        } else {
            opts.disable_statement_logging()
        }
    }

    /// `pool_size + max_overflow` connections at most; checkout waits `pool_timeout` before failing.
    pub fn pool_options(pool: &PoolConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(pool.max_connections())
            .acquire_timeout(pool.checkout_timeout())
            .test_before_acquire(pool.pool_pre_ping)
    }

    /// Open the pool and prove the database is reachable. Failure here is fatal for startup.
    pub async fn connect(config: &DbConfig) -> Result<Self, AppError> {
        tracing::info!(
            url = %config.display_url(),
            driver = %config.driver_type,
            pool_size = config.pool.pool_size,
            max_overflow = config.pool.max_overflow,
            "connecting"
        );
        let pool = Self::pool_options(&config.pool)
            .connect_with(Self::connect_options(config))
            .await
            .map_err(|e| AppError::Connectivity(e.to_string()))?;
        let manager = ConnectionManager {
            pool,
            checkout_timeout: config.pool.checkout_timeout(),
        };
        let version = manager.db_version().await.map_err(|e| AppError::Connectivity(e.to_string()))?;
        tracing::info!(version = %version, "database connected");
        Ok(manager)
    }

    /// Build the pool without opening a connection; the first checkout connects.
    pub fn connect_lazy(config: &DbConfig) -> Self {
        let pool = Self::pool_options(&config.pool).connect_lazy_with(Self::connect_options(config));
        ConnectionManager {
            pool,
            checkout_timeout: config.pool.checkout_timeout(),
        }
    }

    /// Wrap an existing pool; the checkout timeout is the pool's acquire timeout.
    pub fn from_pool(pool: PgPool) -> Self {
        let checkout_timeout = pool.options().get_acquire_timeout();
        ConnectionManager { pool, checkout_timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check out a session. A checkout that outlives the pool timeout is `AppError::PoolExhausted`.
    pub async fn session(&self) -> Result<Session, AppError> {
        match self.pool.acquire().await {
            Ok(conn) => Ok(Session { conn }),
            Err(sqlx::Error::PoolTimedOut) => {
                let stats = self.stats();
                tracing::warn!(
                    timeout = ?self.checkout_timeout,
                    size = stats.size,
                    idle = stats.idle,
                    "session checkout timed out"
                );
                Err(AppError::PoolExhausted)
            }
            Err(e) => Err(AppError::Db(e)),
        }
    }

    pub async fn ping(&self) -> bool {
        let Ok(mut session) = self.session().await else {
            return false;
        };
        sqlx::query("SELECT 1").execute(session.conn()).await.is_ok()
    }

    pub async fn db_version(&self) -> Result<String, AppError> {
        let mut session = self.session().await?;
        let version: String = sqlx::query_scalar("SHOW server_version")
            .fetch_one(session.conn())
            .await?;
        Ok(version)
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.pool.options().get_max_connections(),
        }
    }
}

#[async_trait]
impl SampleProvider for ConnectionManager {
    async fn sample_row(&self, schema: &str, relation: &str) -> Result<Option<Value>, AppError> {
        let mut session = self.session().await?;
        let sql = format!("SELECT to_jsonb(r) FROM {} AS r LIMIT 1", qualified_table(schema, relation));
        tracing::debug!(sql = %sql, "sample");
        let row: Option<Value> = sqlx::query_scalar(&sql).fetch_optional(session.conn()).await?;
        Ok(row)
    }
}

//! # Database Handle
//!
//! One `SqlitePool` shared by every handler, plus the repository accessors.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Who uses a connection, and for how long                                │
//! │                                                                         │
//! │  PUT/DELETE /rules   one write transaction per call (group rewrite)     │
//! │  GET /rules/{id}     one read, plus a short repair transaction when a   │
//! │                      projection disagrees with its manifest             │
//! │  cart mutations      one SELECT over product_promo_meta                 │
//! │  cart/rule writes    catalog lookups, always before any transaction     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite allows a single writer. Rule writes are short, so a writer that
//! finds the database locked waits `busy_timeout` instead of failing with
//! `SQLITE_BUSY`. WAL keeps cart pricing reads running during a rule write.
//!
//! An in-memory database lives inside one connection, so `in_memory()` pins
//! the pool to exactly one. Code that holds a connection must not call back
//! into the pool on that path (catalog checks run before `begin()`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations::{self, SchemaStatus};
use crate::repository::catalog::CatalogRepository;
use crate::repository::meta::MetaRepository;
use crate::repository::rules::RuleRepository;

const MEMORY_PATH: &str = ":memory:";

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,

    /// Pool size. Default: 4
    pub max_connections: u32,

    /// How long a writer waits on a locked database. Default: 5 s
    pub busy_timeout: Duration,

    /// How long a request waits for a free connection. Default: 10 s
    pub acquire_timeout: Duration,
}

impl DbConfig {
    /// File-backed database, created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(10),
        }
    }

    /// Private in-memory database for tests. Always one connection.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }

    /// Pool size actually used: one for in-memory databases, at least one
    /// otherwise.
    pub fn pool_size(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections.max(1)
        }
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        options
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

/// Shared database handle. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size())
            .min_connections(1)
            .acquire_timeout(config.acquire_timeout)
            // An idle in-memory connection must never be reaped.
            .idle_timeout(None)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;

        info!(
            path = %config.path.display(),
            connections = config.pool_size(),
            "Database ready"
        );
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Rule store.
    pub fn rules(&self) -> RuleRepository {
        RuleRepository::new(self.pool.clone())
    }

    /// Pricing projection reads.
    pub fn meta(&self) -> MetaRepository {
        MetaRepository::new(self.pool.clone())
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    /// `true` when a trivial query succeeds.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Applied vs embedded migrations.
    pub async fn schema_status(&self) -> DbResult<SchemaStatus> {
        migrations::schema_status(&self.pool).await
    }

    /// Waits for checked-out connections and closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_uses_one_connection() {
        let config = DbConfig::in_memory().max_connections(8);
        assert!(config.is_in_memory());
        assert_eq!(config.pool_size(), 1);

        let config = DbConfig::new("/tmp/promo.db").max_connections(0);
        assert!(!config.is_in_memory());
        assert_eq!(config.pool_size(), 1);
        assert_eq!(DbConfig::new("/tmp/promo.db").pool_size(), 4);
    }

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);
        assert!(db.schema_status().await.unwrap().is_current());
        assert_eq!(db.rules().summary().await.unwrap().scanned, 0);
    }

    #[tokio::test]
    async fn test_foreign_keys_are_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }
}

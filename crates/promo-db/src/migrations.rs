//! # Schema Migrations
//!
//! SQL files under `migrations/sqlite/` are embedded at compile time and
//! applied on every `Database::new`. Applied versions are tracked by sqlx
//! in `_sqlx_migrations`.
//!
//! ```text
//! 001_initial_schema.sql
//!   products            catalog (id, title, price_minor, is_active)
//!   rule_index          owner ids with at least one rule, for paging
//!   rules               one row per (owner_id, kind)
//!   bundle_groups       bundle manifests keyed by group_key
//!   product_promo_meta  per-product pricing projection
//! ```
//!
//! New changes go in a new numbered file. Applied files are never edited:
//! sqlx refuses to start when a checksum no longer matches.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Where the database schema stands against the embedded migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
    /// Highest embedded migration version
    pub latest: i64,
    /// Versions recorded as applied, ascending
    pub applied: Vec<i64>,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied.last() == Some(&self.latest)
    }
}

/// Applies every pending migration.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;

    let status = schema_status(pool).await?;
    debug!(applied = ?status.applied, "Applied migrations");
    info!(schema_version = status.latest, "Schema up to date");
    Ok(())
}

/// Reads the applied versions. Only successful migrations count.
pub async fn schema_status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    let latest = MIGRATOR
        .iter()
        .map(|migration| migration.version)
        .max()
        .unwrap_or_default();

    let applied: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(pool)
            .await?;

    Ok(SchemaStatus { latest, applied })
}

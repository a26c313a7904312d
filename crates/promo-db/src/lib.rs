//! # promo-db: Database Layer for the Promo Engine
//!
//! SQLite persistence for discount rules, bundle manifests, the per-product
//! pricing projection and the product catalog, using sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Promo Engine Data Flow                           │
//! │                                                                         │
//! │  PUT /rules/{owner_id}                    POST /cart/items              │
//! │       │                                        │                        │
//! │       ▼                                        ▼                        │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     promo-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ RuleRepository│    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ MetaRepository│    │ 001_init.sql │  │   │
//! │  │   │               │    │ CatalogRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (promo.db)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Rules, pricing projection, catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use promo_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./promo.db")).await?;
//!
//! let spec = promo_core::validation::classify(42, &draft)?;
//! db.rules().upsert(42, spec, &db.catalog()).await?;
//!
//! let snapshot = db.meta().load_snapshot(&[42, 43]).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::SchemaStatus;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogProduct, CatalogRepository, ProductCatalog};
pub use repository::meta::MetaRepository;
pub use repository::rules::{
    DeleteOutcome, RuleListItem, RulePage, RuleRepository, RuleSummary, ToggleOutcome,
    UpsertOutcome,
};

//! # Product Catalog
//!
//! The catalog is an external collaborator: the rule store only asks
//! whether ids exist, and listings ask for titles. [`ProductCatalog`] is
//! that seam; [`CatalogRepository`] is the SQLite-backed implementation.
//!
//! ```text
//! RuleStore::upsert_*  ──exists / missing──►  dyn ProductCatalog
//! RuleStore::list      ──title────────────►        │
//! cart handlers        ──base_price───────►        ▼
//!                                           CatalogRepository (products)
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use promo_core::{Money, ProductId};

// =============================================================================
// Collaborator Trait
// =============================================================================

/// Read access to the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Whether an active product with `id` exists.
    async fn exists(&self, id: ProductId) -> DbResult<bool>;

    /// Undiscounted unit price of a product.
    async fn base_price(&self, id: ProductId) -> DbResult<Option<Money>>;

    /// Display title of a product.
    async fn title(&self, id: ProductId) -> DbResult<Option<String>>;

    /// The subset of `ids` that does not exist, in input order.
    async fn missing(&self, ids: &[ProductId]) -> DbResult<Vec<ProductId>> {
        let mut missing = Vec::new();
        for id in ids {
            if !self.exists(*id).await? {
                missing.push(*id);
            }
        }
        Ok(missing)
    }
}

// =============================================================================
// Product Row
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub title: String,
    pub price_minor: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogProduct {
    pub fn price(&self) -> Money {
        Money::from_minor(self.price_minor)
    }
}

// =============================================================================
// SQLite Implementation
// =============================================================================

/// Repository over the `products` table.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Inserts or replaces a product.
    ///
    /// ## Arguments
    /// * `id` - Catalog id (the same id rules are keyed on)
    /// * `title` - Display title
    /// * `price` - Base unit price
    pub async fn upsert(&self, id: ProductId, title: &str, price: Money) -> DbResult<CatalogProduct> {
        debug!(id = %id, title = %title, "Upserting catalog product");

        if price.is_negative() {
            return Err(DbError::QueryFailed(format!(
                "product {id} cannot have a negative price"
            )));
        }

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO products (id, title, price_minor, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, 1, ?4, ?4)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                price_minor = excluded.price_minor,
                is_active = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(id)
        .bind(title)
        .bind(price.minor())
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id.to_string()))
    }

    /// Gets a product by id (active or not).
    pub async fn get_by_id(&self, id: ProductId) -> DbResult<Option<CatalogProduct>> {
        let product = sqlx::query_as::<_, CatalogProduct>(
            r#"
            SELECT id, title, price_minor, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Marks a product inactive. Rules pointing at it stay until edited.
    pub async fn deactivate(&self, id: ProductId) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id.to_string()));
        }
        Ok(())
    }

    /// Counts active products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ProductCatalog for CatalogRepository {
    async fn exists(&self, id: ProductId) -> DbResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = ?1 AND is_active = 1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn base_price(&self, id: ProductId) -> DbResult<Option<Money>> {
        Ok(self
            .get_by_id(id)
            .await?
            .filter(|p| p.is_active)
            .map(|p| p.price()))
    }

    async fn title(&self, id: ProductId) -> DbResult<Option<String>> {
        Ok(self.get_by_id(id).await?.map(|p| p.title))
    }

    /// One query instead of one per id.
    async fn missing(&self, ids: &[ProductId]) -> DbResult<Vec<ProductId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM products WHERE is_active = 1 AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let found: Vec<i64> = qb.build_query_scalar::<i64>().fetch_all(&self.pool).await?;
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn catalog() -> CatalogRepository {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.catalog()
    }

    #[tokio::test]
    async fn test_upsert_and_lookup() {
        let catalog = catalog().await;
        catalog.upsert(10, "Desk", Money::from_minor(10_000)).await.unwrap();

        assert!(catalog.exists(10).await.unwrap());
        assert!(!catalog.exists(11).await.unwrap());
        assert_eq!(catalog.base_price(10).await.unwrap(), Some(Money::from_minor(10_000)));
        assert_eq!(catalog.title(10).await.unwrap().as_deref(), Some("Desk"));
    }

    #[tokio::test]
    async fn test_missing_reports_unknown_and_inactive_ids() {
        let catalog = catalog().await;
        catalog.upsert(10, "Desk", Money::from_minor(100)).await.unwrap();
        catalog.upsert(11, "Lamp", Money::from_minor(100)).await.unwrap();
        catalog.deactivate(11).await.unwrap();

        let missing = catalog.missing(&[10, 11, 12]).await.unwrap();
        assert_eq!(missing, vec![11, 12]);
    }

    #[tokio::test]
    async fn test_negative_price_rejected() {
        let catalog = catalog().await;
        assert!(catalog.upsert(10, "Desk", Money::from_minor(-1)).await.is_err());
    }
}

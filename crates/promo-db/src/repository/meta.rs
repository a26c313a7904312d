//! # Promo Metadata (MetadataSync)
//!
//! A compact per-product row that pricing reads instead of the rule tables.
//!
//! ```text
//! RuleRepository write (transaction)
//!   └── sync_owner(id) ──► project(id) ──► product_promo_meta[id]
//!                                          tier_enabled, tiers JSON
//!                                          bundle_enabled, bundle JSON
//!
//! cart pricing ──► load_snapshot([ids]) ──► PromoSnapshot
//! ```
//!
//! The projection is written in the same transaction as the rule, so a
//! pricing pass right after a CRUD write already sees it.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use super::rules::{decode_rules, fetch_rows};
use crate::error::DbResult;
use promo_core::{BundleRecord, ProductId, ProductPromo, PromoSnapshot, TierProjection, TierRule};

#[derive(Debug, Clone, sqlx::FromRow)]
struct MetaRow {
    product_id: ProductId,
    tier_enabled: bool,
    tiers: Option<String>,
    bundle_enabled: bool,
    bundle: Option<String>,
    #[allow(dead_code)]
    updated_at: DateTime<Utc>,
}

impl MetaRow {
    /// Decodes each half on its own; a bad half is logged and dropped.
    fn decode(self) -> ProductPromo {
        let tier = self.tiers.and_then(|json| {
            match serde_json::from_str::<Vec<TierRule>>(&json) {
                Ok(tiers) => Some(TierProjection {
                    enabled: self.tier_enabled,
                    tiers,
                }),
                Err(e) => {
                    warn!(product_id = %self.product_id, error = %e, "Undecodable tier meta, ignoring");
                    None
                }
            }
        });

        let bundle = self.bundle.and_then(|json| {
            match serde_json::from_str::<BundleRecord>(&json) {
                Ok(mut record) => {
                    record.enabled = record.enabled && self.bundle_enabled;
                    Some(record)
                }
                Err(e) => {
                    warn!(product_id = %self.product_id, error = %e, "Undecodable bundle meta, ignoring");
                    None
                }
            }
        });

        ProductPromo { tier, bundle }
    }
}

/// Repository for the pricing projection.
#[derive(Debug, Clone)]
pub struct MetaRepository {
    pool: SqlitePool,
}

impl MetaRepository {
    /// Creates a new MetaRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MetaRepository { pool }
    }

    /// Loads promo data for a cart's products in one query.
    ///
    /// Products without a meta row are simply absent from the snapshot.
    pub async fn load_snapshot(&self, product_ids: &[ProductId]) -> DbResult<PromoSnapshot> {
        let mut snapshot = PromoSnapshot::new();
        if product_ids.is_empty() {
            return Ok(snapshot);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT product_id, tier_enabled, tiers, bundle_enabled, bundle, updated_at \
             FROM product_promo_meta WHERE product_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in product_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<MetaRow> = qb.build_query_as::<MetaRow>().fetch_all(&self.pool).await?;
        for row in rows {
            let product_id = row.product_id;
            snapshot.insert(product_id, row.decode());
        }

        debug!(requested = product_ids.len(), found = snapshot.len(), "Promo snapshot loaded");
        Ok(snapshot)
    }

    /// Promo data of a single product.
    pub async fn get(&self, product_id: ProductId) -> DbResult<Option<ProductPromo>> {
        Ok(self.load_snapshot(&[product_id]).await?.get(product_id).cloned())
    }
}

/// Rewrites the meta row of `product_id` from its current rules. A product
/// with no rules left loses its row.
pub(crate) async fn project(conn: &mut SqliteConnection, product_id: ProductId) -> DbResult<()> {
    let rules = decode_rules(product_id, fetch_rows(conn, product_id).await?);

    if rules.is_empty() {
        sqlx::query("DELETE FROM product_promo_meta WHERE product_id = ?1")
            .bind(product_id)
            .execute(&mut *conn)
            .await?;
        debug!(product_id = %product_id, "Meta row removed");
        return Ok(());
    }

    let tier_enabled = rules.quantity_discount.as_ref().is_some_and(|c| c.enabled);
    let tiers = rules
        .quantity_discount
        .as_ref()
        .map(|c| serde_json::to_string(&c.tiers))
        .transpose()?;
    let bundle_enabled = rules.bundle.as_ref().is_some_and(|b| b.enabled);
    let bundle = rules.bundle.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO product_promo_meta
            (product_id, tier_enabled, tiers, bundle_enabled, bundle, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(product_id) DO UPDATE SET
            tier_enabled = excluded.tier_enabled,
            tiers = excluded.tiers,
            bundle_enabled = excluded.bundle_enabled,
            bundle = excluded.bundle,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(product_id)
    .bind(tier_enabled)
    .bind(tiers)
    .bind(bundle_enabled)
    .bind(bundle)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    debug!(product_id = %product_id, "Meta row projected");
    Ok(())
}

//! # Rule Repository (RuleStore)
//!
//! Persistence for quantity-tier configs and bundle groups.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  bundle_groups (manifest, one per group_key)                           │
//! │    group_key ─┬─ targets [10, 11] ─ version v7                         │
//! │               │                                                         │
//! │  rules (one row per owner + kind)                                      │
//! │    (10, bundle_discount)   group_key, version v7, BundleRecord JSON    │
//! │    (11, bundle_discount)   group_key, version v7, BundleRecord JSON    │
//! │    (10, quantity_discount) tiers JSON                                  │
//! │                                                                         │
//! │  rule_index               owner ids with ≥ 1 rule, for paging          │
//! │  product_promo_meta       pricing projection (see meta.rs)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Group Writes
//! ```text
//! upsert_group(owner, spec)        (one transaction)
//!   1. tear down the group `owner` anchors today, if it differs
//!   2. tear down any group already using the new key
//!   3. detach each target from whatever other group it anchors
//!   4. write manifest + one projection per target, fresh version stamp
//!   5. refresh rule_index and meta for every touched product
//! ```
//!
//! Readers never see a half-written group. A projection that still
//! disagrees with its manifest is repaired on read by `get_by_owner`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::catalog::ProductCatalog;
use super::meta;
use crate::error::{DbError, DbResult};
use promo_core::validation::PageRequest;
use promo_core::{
    ApplyScope, BundleGroup, BundleRateTier, BundleRecord, CoreError, GroupSpec, OwnerRules,
    ProductId, QuantityDiscountConfig, RuleFilter, RuleKind, RuleSpec, TierRule, TierStats,
    ValidationError,
};

/// Index rows read per batch when a listing has to filter.
const SCAN_BATCH: i64 = 200;

const RULE_COLUMNS: &str = "owner_id, kind, enabled, group_key, version, payload, updated_at";

const GROUP_COLUMNS: &str = "group_key, name, enabled, priority, apply_scope, main_ids, \
                             product_ids, rate_tiers, targets, version, updated_at";

// =============================================================================
// Rows
// =============================================================================

/// One `rules` row. `payload` is the tiers array or a BundleRecord.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct RuleRow {
    pub owner_id: ProductId,
    pub kind: RuleKind,
    pub enabled: bool,
    pub group_key: Option<String>,
    pub version: String,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct GroupRow {
    group_key: String,
    name: String,
    enabled: bool,
    priority: i64,
    apply_scope: ApplyScope,
    main_ids: String,
    product_ids: String,
    rate_tiers: String,
    targets: String,
    version: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GroupRow> for BundleGroup {
    type Error = DbError;

    fn try_from(row: GroupRow) -> DbResult<Self> {
        Ok(BundleGroup {
            group_key: row.group_key,
            name: row.name,
            enabled: row.enabled,
            priority: row.priority,
            apply_scope: row.apply_scope,
            main_ids: serde_json::from_str(&row.main_ids)?,
            product_ids: serde_json::from_str(&row.product_ids)?,
            rate_tiers: serde_json::from_str::<Vec<BundleRateTier>>(&row.rate_tiers)?,
            targets: serde_json::from_str(&row.targets)?,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

/// Builds an owner's records from its rows. Rows that fail to decode are
/// logged and left out.
pub(crate) fn decode_rules(owner_id: ProductId, rows: Vec<RuleRow>) -> OwnerRules {
    let mut rules = OwnerRules {
        owner_id,
        quantity_discount: None,
        bundle: None,
    };

    for row in rows {
        match row.kind {
            RuleKind::QuantityDiscount => match serde_json::from_str::<Vec<TierRule>>(&row.payload) {
                Ok(tiers) => {
                    rules.quantity_discount = Some(QuantityDiscountConfig {
                        owner_id,
                        enabled: row.enabled,
                        tiers,
                        updated_at: row.updated_at,
                    })
                }
                Err(e) => warn!(owner_id = %owner_id, error = %e, "Skipping undecodable tier config"),
            },
            RuleKind::BundleDiscount => match serde_json::from_str::<BundleRecord>(&row.payload) {
                Ok(record) => rules.bundle = Some(record),
                Err(e) => warn!(owner_id = %owner_id, error = %e, "Skipping undecodable bundle record"),
            },
        }
    }

    rules
}

// =============================================================================
// Listing DTOs
// =============================================================================

/// One owner in a rule listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleListItem {
    pub owner_id: ProductId,
    pub title: Option<String>,
    pub enabled: bool,
    pub quantity_discount: Option<QuantityDiscountConfig>,
    pub tier_stats: Option<TierStats>,
    pub bundle: Option<BundleRecord>,
}

impl RuleListItem {
    fn new(rules: OwnerRules, title: Option<String>) -> Self {
        RuleListItem {
            owner_id: rules.owner_id,
            title,
            enabled: rules.any_enabled(),
            tier_stats: rules.quantity_discount.as_ref().map(QuantityDiscountConfig::stats),
            quantity_discount: rules.quantity_discount,
            bundle: rules.bundle,
        }
    }
}

/// A page of the rule index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RulePage {
    pub items: Vec<RuleListItem>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Counts over the whole rule index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub scanned: u64,
    pub enabled: u64,
    pub disabled: u64,
    pub quantity: u64,
    pub bundle: u64,
}

/// What a write committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpsertOutcome {
    QuantityDiscount(QuantityDiscountConfig),
    BundleDiscount(BundleGroup),
}

/// What a delete removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub owner_id: ProductId,
    pub kinds: Vec<RuleKind>,
    /// Every product whose records changed, cascade included.
    pub affected: Vec<ProductId>,
}

/// What an enable/disable switched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub owner_id: ProductId,
    pub enabled: bool,
    pub kinds: Vec<RuleKind>,
    /// Every product whose records changed; a bundle switches for all its targets.
    pub affected: Vec<ProductId>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for discount rules.
///
/// ## Usage
/// ```rust,ignore
/// let spec = validation::classify(owner_id, &draft)?;
/// let outcome = db.rules().upsert(owner_id, spec, &db.catalog()).await?;
/// let rules = db.rules().get_by_owner(owner_id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct RuleRepository {
    pool: SqlitePool,
}

impl RuleRepository {
    /// Creates a new RuleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RuleRepository { pool }
    }

    /// Writes a validated rule for `owner_id`.
    pub async fn upsert(
        &self,
        owner_id: ProductId,
        spec: RuleSpec,
        catalog: &dyn ProductCatalog,
    ) -> DbResult<UpsertOutcome> {
        match spec {
            RuleSpec::QuantityDiscount { enabled, tiers } => self
                .upsert_tier_config(owner_id, enabled, tiers, catalog)
                .await
                .map(UpsertOutcome::QuantityDiscount),
            RuleSpec::BundleDiscount(group) => self
                .upsert_group(owner_id, group, catalog)
                .await
                .map(UpsertOutcome::BundleDiscount),
        }
    }

    /// Creates or replaces the tier config of one product.
    ///
    /// ## Arguments
    /// * `owner_id` - Product the tiers apply to (must exist in the catalog)
    /// * `enabled` - Whether pricing should use the tiers
    /// * `tiers` - Normalized tiers (ascending, unique `min_qty`)
    pub async fn upsert_tier_config(
        &self,
        owner_id: ProductId,
        enabled: bool,
        tiers: Vec<TierRule>,
        catalog: &dyn ProductCatalog,
    ) -> DbResult<QuantityDiscountConfig> {
        debug!(owner_id = %owner_id, tiers = tiers.len(), "Upserting tier config");

        if tiers.is_empty() {
            return Err(ValidationError::Required { field: "tiers".to_string() }.into());
        }
        if !catalog.exists(owner_id).await? {
            return Err(CoreError::UnknownProducts(vec![owner_id]).into());
        }

        let config = QuantityDiscountConfig {
            owner_id,
            enabled,
            tiers,
            updated_at: Utc::now(),
        };
        let payload = serde_json::to_string(&config.tiers)?;
        let version = new_version();

        let mut tx = self.pool.begin().await?;
        write_rule(
            &mut tx,
            owner_id,
            RuleKind::QuantityDiscount,
            enabled,
            None,
            &version,
            &payload,
            config.updated_at,
        )
        .await?;
        sync_owner(&mut tx, owner_id).await?;
        tx.commit().await?;

        info!(owner_id = %owner_id, "Tier config saved");
        Ok(config)
    }

    /// Writes a bundle group atomically (see module docs).
    ///
    /// ## Returns
    /// * `Ok(BundleGroup)` - The committed manifest with its targets
    /// * `Err(DbError::Core(..))` - Unknown ids or an invalid group
    pub async fn upsert_group(
        &self,
        owner_id: ProductId,
        spec: GroupSpec,
        catalog: &dyn ProductCatalog,
    ) -> DbResult<BundleGroup> {
        if spec.product_ids.len() < 2 {
            return Err(ValidationError::TooFewItems {
                field: "product_ids".to_string(),
                min: 2,
                actual: spec.product_ids.len(),
            }
            .into());
        }
        if !spec.targets().contains(&owner_id) {
            return Err(ValidationError::InvalidFormat {
                field: "owner_id".to_string(),
                reason: format!("product {owner_id} is not a target of this bundle"),
            }
            .into());
        }

        let missing = catalog.missing(&spec.product_ids).await?;
        if !missing.is_empty() {
            return Err(CoreError::UnknownProducts(missing).into());
        }

        let group = BundleGroup {
            group_key: spec.group_key(),
            targets: spec.targets().to_vec(),
            name: spec.name,
            enabled: spec.enabled,
            priority: spec.priority,
            apply_scope: spec.apply_scope,
            main_ids: spec.main_ids,
            product_ids: spec.product_ids,
            rate_tiers: spec.rate_tiers,
            version: new_version(),
            updated_at: Utc::now(),
        };

        debug!(
            owner_id = %owner_id,
            group_key = %group.group_key,
            targets = ?group.targets,
            "Upserting bundle group"
        );

        let mut tx = self.pool.begin().await?;
        let mut affected: BTreeSet<ProductId> = BTreeSet::new();

        if let Some(current) = anchored_group_key(&mut tx, owner_id).await? {
            if current != group.group_key {
                teardown_group(&mut tx, &current, &mut affected).await?;
            }
        }
        teardown_group(&mut tx, &group.group_key, &mut affected).await?;

        for target in &group.targets {
            if let Some(other) = anchored_group_key(&mut tx, *target).await? {
                detach_target(&mut tx, &other, *target).await?;
            }
        }

        write_group(&mut tx, &group).await?;
        for target in &group.targets {
            write_projection(&mut tx, &group.project(*target), group.updated_at).await?;
            affected.insert(*target);
        }

        for id in &affected {
            sync_owner(&mut tx, *id).await?;
        }
        tx.commit().await?;

        info!(
            group_key = %group.group_key,
            targets = group.targets.len(),
            touched = affected.len(),
            "Bundle group saved"
        );
        Ok(group)
    }

    /// Returns everything `owner_id` holds, or `None`.
    ///
    /// A bundle projection is checked against its manifest first: a stale
    /// one is rewritten from the manifest, an orphan is deleted.
    pub async fn get_by_owner(&self, owner_id: ProductId) -> DbResult<Option<OwnerRules>> {
        let (rows, health) = {
            let mut conn = self.pool.acquire().await?;
            let rows = fetch_rows(&mut conn, owner_id).await?;
            let health = check_projection(&mut conn, owner_id, &rows).await?;
            (rows, health)
        };

        let observed = bundle_row(&rows).cloned();
        let rows = match (health, observed) {
            (ProjectionHealth::Current, _) | (_, None) => rows,
            (_, Some(observed)) => self.heal_projection(owner_id, &observed).await?,
        };

        let rules = decode_rules(owner_id, rows);
        Ok((!rules.is_empty()).then_some(rules))
    }

    /// Repairs the projection observed by an earlier read and returns the
    /// owner's rows as committed.
    ///
    /// The check is repeated inside the transaction, and every write only
    /// applies while the row still holds the observed payload. A writer
    /// that replaced the projection in between wins; its row is returned
    /// untouched.
    pub(crate) async fn heal_projection(
        &self,
        owner_id: ProductId,
        observed: &RuleRow,
    ) -> DbResult<Vec<RuleRow>> {
        let mut tx = self.pool.begin().await?;
        let rows = fetch_rows(&mut tx, owner_id).await?;

        let unchanged = bundle_row(&rows).is_some_and(|row| row.payload == observed.payload);
        if !unchanged {
            debug!(owner_id = %owner_id, "Projection changed since read, leaving it alone");
            tx.commit().await?;
            return Ok(rows);
        }

        let repaired = match check_projection(&mut tx, owner_id, &rows).await? {
            ProjectionHealth::Current => false,
            ProjectionHealth::Stale(group) => {
                warn!(
                    owner_id = %owner_id,
                    group_key = %group.group_key,
                    "Stale bundle projection, rewriting from manifest"
                );
                let fresh = group.project(owner_id);
                replace_projection_if(&mut tx, &observed.payload, &fresh, group.updated_at).await?
            }
            ProjectionHealth::Orphan => {
                warn!(
                    owner_id = %owner_id,
                    group_key = ?observed.group_key,
                    "Orphaned bundle projection, deleting"
                );
                delete_projection_if(&mut tx, owner_id, &observed.payload).await?
            }
        };

        let rows = if repaired {
            sync_owner(&mut tx, owner_id).await?;
            fetch_rows(&mut tx, owner_id).await?
        } else {
            rows
        };
        tx.commit().await?;
        Ok(rows)
    }

    /// Deletes an owner's records. Bundles cascade to every product sharing
    /// the group key.
    ///
    /// ## Arguments
    /// * `owner_id` - Owner to delete for
    /// * `kind` - Limit the delete to one kind (`None` deletes both)
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Nothing of that kind exists
    pub async fn delete_by_owner(
        &self,
        owner_id: ProductId,
        kind: Option<RuleKind>,
    ) -> DbResult<DeleteOutcome> {
        debug!(owner_id = %owner_id, kind = ?kind, "Deleting rules");

        let mut tx = self.pool.begin().await?;
        let rows: Vec<RuleRow> = fetch_rows(&mut tx, owner_id)
            .await?
            .into_iter()
            .filter(|row| kind.map_or(true, |k| row.kind == k))
            .collect();

        if rows.is_empty() {
            return Err(DbError::not_found("Rule", owner_id.to_string()));
        }

        let mut affected = BTreeSet::from([owner_id]);
        let mut kinds = Vec::with_capacity(rows.len());
        for row in &rows {
            if let (RuleKind::BundleDiscount, Some(key)) = (row.kind, &row.group_key) {
                teardown_group(&mut tx, key, &mut affected).await?;
            }
            delete_rule(&mut tx, owner_id, row.kind).await?;
            kinds.push(row.kind);
        }

        for id in &affected {
            sync_owner(&mut tx, *id).await?;
        }
        tx.commit().await?;

        info!(owner_id = %owner_id, affected = affected.len(), "Rules deleted");
        Ok(DeleteOutcome {
            owner_id,
            kinds,
            affected: affected.into_iter().collect(),
        })
    }

    /// Switches an owner's rules on or off, keeping tiers and bundle
    /// contents as they are.
    ///
    /// A bundle is switched for the whole group: manifest and every
    /// projection get the flag and a fresh version in one transaction.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Nothing of that kind exists
    pub async fn set_enabled(
        &self,
        owner_id: ProductId,
        kind: Option<RuleKind>,
        enabled: bool,
    ) -> DbResult<ToggleOutcome> {
        debug!(owner_id = %owner_id, kind = ?kind, enabled, "Switching rules");

        let mut tx = self.pool.begin().await?;
        let rows: Vec<RuleRow> = fetch_rows(&mut tx, owner_id)
            .await?
            .into_iter()
            .filter(|row| kind.map_or(true, |k| row.kind == k))
            .collect();

        if rows.is_empty() {
            return Err(DbError::not_found("Rule", owner_id.to_string()));
        }

        let now = Utc::now();
        let mut affected = BTreeSet::from([owner_id]);
        let mut kinds = Vec::with_capacity(rows.len());
        for row in &rows {
            match (row.kind, &row.group_key) {
                (RuleKind::QuantityDiscount, _) => {
                    sqlx::query(
                        "UPDATE rules SET enabled = ?3, version = ?4, updated_at = ?5 \
                         WHERE owner_id = ?1 AND kind = ?2",
                    )
                    .bind(owner_id)
                    .bind(RuleKind::QuantityDiscount)
                    .bind(enabled)
                    .bind(new_version())
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                (RuleKind::BundleDiscount, Some(key)) => {
                    let Some(mut group) = fetch_group(&mut tx, key).await? else {
                        return Err(DbError::not_found("Bundle group", key.clone()));
                    };
                    group.enabled = enabled;
                    group.version = new_version();
                    group.updated_at = now;

                    write_group(&mut tx, &group).await?;
                    for target in &group.targets {
                        write_projection(&mut tx, &group.project(*target), now).await?;
                        affected.insert(*target);
                    }
                }
                (RuleKind::BundleDiscount, None) => {
                    warn!(owner_id = %owner_id, "Bundle projection without group key, skipping");
                    continue;
                }
            }
            kinds.push(row.kind);
        }

        for id in &affected {
            sync_owner(&mut tx, *id).await?;
        }
        tx.commit().await?;

        info!(owner_id = %owner_id, enabled, affected = affected.len(), "Rules switched");
        Ok(ToggleOutcome {
            owner_id,
            enabled,
            kinds,
            affected: affected.into_iter().collect(),
        })
    }

    /// Gets a bundle manifest by key.
    pub async fn get_group(&self, group_key: &str) -> DbResult<Option<BundleGroup>> {
        let mut conn = self.pool.acquire().await?;
        fetch_group(&mut conn, group_key).await
    }

    /// Pages through the rule index.
    ///
    /// `search` matches an owner id exactly or a title substring
    /// (case-insensitive). Titles come from `catalog`.
    pub async fn list(
        &self,
        page: PageRequest,
        search: Option<&str>,
        filter: RuleFilter,
        catalog: &dyn ProductCatalog,
    ) -> DbResult<RulePage> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        debug!(page = page.page, per_page = page.per_page, search = ?needle, filter = ?filter, "Listing rules");

        if needle.is_none() && filter == RuleFilter::All {
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rule_index")
                .fetch_one(&self.pool)
                .await?;
            let ids: Vec<ProductId> = sqlx::query_scalar(
                "SELECT owner_id FROM rule_index ORDER BY owner_id LIMIT ?1 OFFSET ?2",
            )
            .bind(page.per_page as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

            let mut items = Vec::with_capacity(ids.len());
            for rules in self.load_many(&ids).await?.into_values() {
                let title = catalog.title(rules.owner_id).await?;
                items.push(RuleListItem::new(rules, title));
            }
            return Ok(RulePage {
                items,
                total: total.max(0) as u64,
                page: page.page,
                per_page: page.per_page,
            });
        }

        let start = page.offset();
        let end = start + page.per_page as u64;
        let mut total: u64 = 0;
        let mut items = Vec::new();
        let mut after = ProductId::MIN;

        loop {
            let ids = self.index_batch(after).await?;
            let Some(last) = ids.last() else {
                break;
            };
            after = *last;

            for rules in self.load_many(&ids).await?.into_values() {
                if !filter.matches(&rules) {
                    continue;
                }
                let title = match &needle {
                    Some(needle) => {
                        let title = catalog.title(rules.owner_id).await?;
                        if !matches_search(rules.owner_id, title.as_deref(), needle) {
                            continue;
                        }
                        title
                    }
                    None if (start..end).contains(&total) => catalog.title(rules.owner_id).await?,
                    None => None,
                };
                if (start..end).contains(&total) {
                    items.push(RuleListItem::new(rules, title));
                }
                total += 1;
            }
        }

        Ok(RulePage {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }

    /// Counts over every indexed owner.
    pub async fn summary(&self) -> DbResult<RuleSummary> {
        let mut summary = RuleSummary::default();
        let mut after = ProductId::MIN;

        loop {
            let ids = self.index_batch(after).await?;
            let Some(last) = ids.last() else {
                break;
            };
            after = *last;

            for rules in self.load_many(&ids).await?.into_values() {
                summary.scanned += 1;
                if rules.any_enabled() {
                    summary.enabled += 1;
                } else {
                    summary.disabled += 1;
                }
                if rules.quantity_discount.is_some() {
                    summary.quantity += 1;
                }
                if rules.bundle.is_some() {
                    summary.bundle += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn index_batch(&self, after: ProductId) -> DbResult<Vec<ProductId>> {
        let ids: Vec<ProductId> = sqlx::query_scalar(
            "SELECT owner_id FROM rule_index WHERE owner_id > ?1 ORDER BY owner_id LIMIT ?2",
        )
        .bind(after)
        .bind(SCAN_BATCH)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Loads the records of many owners in one query, keyed by owner.
    async fn load_many(&self, ids: &[ProductId]) -> DbResult<BTreeMap<ProductId, OwnerRules>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {RULE_COLUMNS} FROM rules WHERE owner_id IN ("));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY owner_id");

        let rows: Vec<RuleRow> = qb.build_query_as::<RuleRow>().fetch_all(&self.pool).await?;

        let mut grouped: BTreeMap<ProductId, Vec<RuleRow>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.owner_id).or_default().push(row);
        }

        Ok(grouped
            .into_iter()
            .map(|(owner_id, rows)| (owner_id, decode_rules(owner_id, rows)))
            .filter(|(_, rules)| !rules.is_empty())
            .collect())
    }
}

fn matches_search(owner_id: ProductId, title: Option<&str>, needle: &str) -> bool {
    owner_id.to_string() == needle
        || title.is_some_and(|t| t.to_lowercase().contains(needle))
}

fn new_version() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Connection-level helpers (run inside a transaction)
// =============================================================================

pub(crate) async fn fetch_rows(conn: &mut SqliteConnection, owner_id: ProductId) -> DbResult<Vec<RuleRow>> {
    let rows = sqlx::query_as::<_, RuleRow>(&format!(
        "SELECT {RULE_COLUMNS} FROM rules WHERE owner_id = ?1 ORDER BY kind"
    ))
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

async fn fetch_group(conn: &mut SqliteConnection, group_key: &str) -> DbResult<Option<BundleGroup>> {
    let row = sqlx::query_as::<_, GroupRow>(&format!(
        "SELECT {GROUP_COLUMNS} FROM bundle_groups WHERE group_key = ?1"
    ))
    .bind(group_key)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(BundleGroup::try_from).transpose()
}

/// Key of the bundle `owner_id` currently anchors.
async fn anchored_group_key(conn: &mut SqliteConnection, owner_id: ProductId) -> DbResult<Option<String>> {
    let key: Option<Option<String>> = sqlx::query_scalar(
        "SELECT group_key FROM rules WHERE owner_id = ?1 AND kind = ?2",
    )
    .bind(owner_id)
    .bind(RuleKind::BundleDiscount)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(key.flatten())
}

/// How a bundle projection relates to its manifest.
#[derive(Debug)]
enum ProjectionHealth {
    /// No projection, an undecodable one, or one matching its manifest.
    Current,
    /// The manifest still lists the owner under a newer version.
    Stale(BundleGroup),
    /// No manifest, or one that no longer lists the owner.
    Orphan,
}

fn bundle_row(rows: &[RuleRow]) -> Option<&RuleRow> {
    rows.iter().find(|row| row.kind == RuleKind::BundleDiscount)
}

async fn check_projection(
    conn: &mut SqliteConnection,
    owner_id: ProductId,
    rows: &[RuleRow],
) -> DbResult<ProjectionHealth> {
    let Some(row) = bundle_row(rows) else {
        return Ok(ProjectionHealth::Current);
    };
    let Ok(record) = serde_json::from_str::<BundleRecord>(&row.payload) else {
        return Ok(ProjectionHealth::Current);
    };

    Ok(match fetch_group(conn, &record.group_key).await? {
        Some(group) if group.targets.contains(&owner_id) => {
            if group.version == record.version {
                ProjectionHealth::Current
            } else {
                ProjectionHealth::Stale(group)
            }
        }
        _ => ProjectionHealth::Orphan,
    })
}

/// Rewrites a projection only while it still holds `expected`.
async fn replace_projection_if(
    conn: &mut SqliteConnection,
    expected: &str,
    fresh: &BundleRecord,
    updated_at: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE rules
        SET enabled = ?3, group_key = ?4, version = ?5, payload = ?6, updated_at = ?7
        WHERE owner_id = ?1 AND kind = ?2 AND payload = ?8
        "#,
    )
    .bind(fresh.main_id)
    .bind(RuleKind::BundleDiscount)
    .bind(fresh.enabled)
    .bind(&fresh.group_key)
    .bind(&fresh.version)
    .bind(serde_json::to_string(fresh)?)
    .bind(updated_at)
    .bind(expected)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Deletes a projection only while it still holds `expected`.
async fn delete_projection_if(
    conn: &mut SqliteConnection,
    owner_id: ProductId,
    expected: &str,
) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM rules WHERE owner_id = ?1 AND kind = ?2 AND payload = ?3")
        .bind(owner_id)
        .bind(RuleKind::BundleDiscount)
        .bind(expected)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[allow(clippy::too_many_arguments)]
async fn write_rule(
    conn: &mut SqliteConnection,
    owner_id: ProductId,
    kind: RuleKind,
    enabled: bool,
    group_key: Option<&str>,
    version: &str,
    payload: &str,
    updated_at: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO rules (owner_id, kind, enabled, group_key, version, payload, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(owner_id, kind) DO UPDATE SET
            enabled = excluded.enabled,
            group_key = excluded.group_key,
            version = excluded.version,
            payload = excluded.payload,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(owner_id)
    .bind(kind)
    .bind(enabled)
    .bind(group_key)
    .bind(version)
    .bind(payload)
    .bind(updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn write_projection(
    conn: &mut SqliteConnection,
    record: &BundleRecord,
    updated_at: DateTime<Utc>,
) -> DbResult<()> {
    let payload = serde_json::to_string(record)?;
    write_rule(
        conn,
        record.main_id,
        RuleKind::BundleDiscount,
        record.enabled,
        Some(&record.group_key),
        &record.version,
        &payload,
        updated_at,
    )
    .await
}

async fn delete_rule(conn: &mut SqliteConnection, owner_id: ProductId, kind: RuleKind) -> DbResult<()> {
    sqlx::query("DELETE FROM rules WHERE owner_id = ?1 AND kind = ?2")
        .bind(owner_id)
        .bind(kind)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn write_group(conn: &mut SqliteConnection, group: &BundleGroup) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bundle_groups
            (group_key, name, enabled, priority, apply_scope, main_ids,
             product_ids, rate_tiers, targets, version, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(group_key) DO UPDATE SET
            name = excluded.name,
            enabled = excluded.enabled,
            priority = excluded.priority,
            apply_scope = excluded.apply_scope,
            main_ids = excluded.main_ids,
            product_ids = excluded.product_ids,
            rate_tiers = excluded.rate_tiers,
            targets = excluded.targets,
            version = excluded.version,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&group.group_key)
    .bind(&group.name)
    .bind(group.enabled)
    .bind(group.priority)
    .bind(group.apply_scope)
    .bind(serde_json::to_string(&group.main_ids)?)
    .bind(serde_json::to_string(&group.product_ids)?)
    .bind(serde_json::to_string(&group.rate_tiers)?)
    .bind(serde_json::to_string(&group.targets)?)
    .bind(&group.version)
    .bind(group.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deletes a manifest and every projection carrying its key.
async fn teardown_group(
    conn: &mut SqliteConnection,
    group_key: &str,
    affected: &mut BTreeSet<ProductId>,
) -> DbResult<()> {
    let owners: Vec<ProductId> = sqlx::query_scalar(
        "SELECT owner_id FROM rules WHERE kind = ?1 AND group_key = ?2",
    )
    .bind(RuleKind::BundleDiscount)
    .bind(group_key)
    .fetch_all(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM rules WHERE kind = ?1 AND group_key = ?2")
        .bind(RuleKind::BundleDiscount)
        .bind(group_key)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM bundle_groups WHERE group_key = ?1")
        .bind(group_key)
        .execute(&mut *conn)
        .await?;

    if !owners.is_empty() {
        debug!(group_key = %group_key, owners = ?owners, "Group torn down");
    }
    affected.extend(owners);
    Ok(())
}

/// Removes `target` from another group, dropping that group's manifest once
/// no target is left.
async fn detach_target(conn: &mut SqliteConnection, group_key: &str, target: ProductId) -> DbResult<()> {
    delete_rule(conn, target, RuleKind::BundleDiscount).await?;

    let Some(mut group) = fetch_group(conn, group_key).await? else {
        return Ok(());
    };
    group.targets.retain(|id| *id != target);

    if group.targets.is_empty() {
        sqlx::query("DELETE FROM bundle_groups WHERE group_key = ?1")
            .bind(group_key)
            .execute(&mut *conn)
            .await?;
        debug!(group_key = %group_key, "Last target detached, manifest removed");
    } else {
        sqlx::query("UPDATE bundle_groups SET targets = ?2 WHERE group_key = ?1")
            .bind(group_key)
            .bind(serde_json::to_string(&group.targets)?)
            .execute(&mut *conn)
            .await?;
        debug!(group_key = %group_key, target = %target, "Target detached");
    }
    Ok(())
}

/// Brings `rule_index` and the pricing projection in line with `rules`.
async fn sync_owner(conn: &mut SqliteConnection, owner_id: ProductId) -> DbResult<()> {
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rules WHERE owner_id = ?1")
        .bind(owner_id)
        .fetch_one(&mut *conn)
        .await?;

    if remaining == 0 {
        sqlx::query("DELETE FROM rule_index WHERE owner_id = ?1")
            .bind(owner_id)
            .execute(&mut *conn)
            .await?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO rule_index (owner_id, updated_at) VALUES (?1, ?2)
            ON CONFLICT(owner_id) DO UPDATE SET updated_at = excluded.updated_at
            "#,
        )
        .bind(owner_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    }

    meta::project(conn, owner_id).await
}

// =============================================================================
// Unit Tests
// =============================================================================

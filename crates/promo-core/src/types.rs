//! # Domain Types
//!
//! Rule, projection and cart types used throughout the Promo Engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────────────┐        ┌──────────────────────────────┐      │
//! │  │ QuantityDiscountConfig│        │ BundleGroup (manifest)       │      │
//! │  │ ──────────────────── │        │ ──────────────────────────── │      │
//! │  │ owner_id             │        │ group_key = hash(products)   │      │
//! │  │ enabled              │        │ apply_scope, main_ids        │      │
//! │  │ tiers: [TierRule]    │        │ product_ids, rate_tiers      │      │
//! │  └──────────────────────┘        └──────────────┬───────────────┘      │
//! │                                                 │ project(target)      │
//! │                                                 ▼                       │
//! │                                  ┌──────────────────────────────┐      │
//! │                                  │ BundleRecord (per target)    │      │
//! │                                  │ main_id, combo_ids, version  │      │
//! │                                  └──────────────────────────────┘      │
//! │                                                                         │
//! │  ProductPromo = { tier?, bundle? }  ← what pricing reads per product   │
//! │  CartLine                           ← what the host cart hands us      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use ts_rs::TS;

use crate::hashing;
use crate::money::Money;

/// Catalog product identifier. Variations carry their own id but roll up
/// to the parent's id for pricing.
pub type ProductId = i64;

// =============================================================================
// Discount Rate
// =============================================================================

/// Discount rate in basis points (bps).
///
/// 1 bps = 0.01%, so 500 = 5% and 9500 = the 95% ceiling. On the wire the
/// rate is a decimal fraction (`0.05`), which is what admins type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// The highest rate any rule may carry (95%).
    pub const MAX: DiscountRate = DiscountRate(9_500);

    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Converts a decimal fraction to the nearest basis point.
    ///
    /// Returns `None` for NaN, infinities and negative input. Range checks
    /// against [`DiscountRate::MAX`] belong to validation.
    pub fn from_fraction(fraction: f64) -> Option<Self> {
        if !fraction.is_finite() || fraction < 0.0 || fraction > 1.0 {
            return None;
        }
        Some(DiscountRate((fraction * 10_000.0).round() as u32))
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a decimal fraction.
    #[inline]
    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for DiscountRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for DiscountRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_fraction())
    }
}

impl<'de> Deserialize<'de> for DiscountRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fraction = f64::deserialize(deserializer)?;
        DiscountRate::from_fraction(fraction).ok_or_else(|| {
            serde::de::Error::custom(format!("rate {fraction} is not a fraction in [0, 1]"))
        })
    }
}

// =============================================================================
// Thresholds
// =============================================================================

/// Anything that maps a threshold to a rate. Tiers key on quantity, bundle
/// rate tiers key on distinct-item count; both go through the same `pick`.
pub trait Threshold {
    fn threshold(&self) -> u32;
    fn rate(&self) -> DiscountRate;
}

/// One quantity tier: buy at least `min_qty`, get `rate` off every unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierRule {
    pub min_qty: u32,
    pub rate: DiscountRate,
}

impl Threshold for TierRule {
    fn threshold(&self) -> u32 {
        self.min_qty
    }

    fn rate(&self) -> DiscountRate {
        self.rate
    }
}

/// One bundle rate tier: at least `min_items` distinct products present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BundleRateTier {
    pub min_items: u32,
    pub rate: DiscountRate,
}

impl Threshold for BundleRateTier {
    fn threshold(&self) -> u32 {
        self.min_items
    }

    fn rate(&self) -> DiscountRate {
        self.rate
    }
}

// =============================================================================
// Rule Kind
// =============================================================================

/// The two discount mechanisms. One owner may hold one record of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    QuantityDiscount,
    BundleDiscount,
}

impl RuleKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RuleKind::QuantityDiscount => "quantity_discount",
            RuleKind::BundleDiscount => "bundle_discount",
        }
    }
}

/// Listing filter for the admin rule index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RuleFilter {
    #[default]
    All,
    Enabled,
    Disabled,
    Quantity,
    Bundle,
}

impl RuleFilter {
    /// Whether an owner's records pass this filter.
    pub fn matches(&self, rules: &OwnerRules) -> bool {
        match self {
            RuleFilter::All => true,
            RuleFilter::Enabled => rules.any_enabled(),
            RuleFilter::Disabled => !rules.any_enabled(),
            RuleFilter::Quantity => rules.quantity_discount.is_some(),
            RuleFilter::Bundle => rules.bundle.is_some(),
        }
    }
}

// =============================================================================
// Quantity Discount Config
// =============================================================================

/// Per-product "buy more, save more" configuration.
///
/// Tiers are unique by `min_qty` and stored ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuantityDiscountConfig {
    pub owner_id: ProductId,
    pub enabled: bool,
    pub tiers: Vec<TierRule>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl QuantityDiscountConfig {
    /// Summary numbers shown next to a rule in listings.
    pub fn stats(&self) -> TierStats {
        TierStats {
            tier_count: self.tiers.len(),
            max_rate: self.tiers.iter().map(|t| t.rate).max().unwrap_or_default(),
            min_qty_min: self.tiers.iter().map(|t| t.min_qty).min(),
            min_qty_max: self.tiers.iter().map(|t| t.min_qty).max(),
        }
    }
}

/// Listing statistics for one tier config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierStats {
    pub tier_count: usize,
    pub max_rate: DiscountRate,
    pub min_qty_min: Option<u32>,
    pub min_qty_max: Option<u32>,
}

// =============================================================================
// Bundles
// =============================================================================

/// Which members of a bundle own a projection (and so can anchor it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ApplyScope {
    /// Only the main products anchor the bundle.
    #[default]
    #[serde(alias = "MAIN_ONLY")]
    MainOnly,
    /// Every product in the bundle anchors it.
    #[serde(alias = "ALL_IN_COMBO")]
    AllInCombo,
}

/// A validated bundle definition, before it gets a version stamp.
///
/// Built by [`crate::validation::normalize_group`]; ids are distinct and in
/// first-seen order, `main_ids ⊆ product_ids`, rate tiers ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GroupSpec {
    pub name: String,
    pub enabled: bool,
    pub priority: i64,
    pub apply_scope: ApplyScope,
    pub main_ids: Vec<ProductId>,
    pub product_ids: Vec<ProductId>,
    pub rate_tiers: Vec<BundleRateTier>,
}

impl GroupSpec {
    /// Identity of the bundle: identical product sets share one key.
    pub fn group_key(&self) -> String {
        hashing::group_key(&self.product_ids)
    }

    /// Products that receive a projection.
    pub fn targets(&self) -> &[ProductId] {
        match self.apply_scope {
            ApplyScope::MainOnly => &self.main_ids,
            ApplyScope::AllInCombo => &self.product_ids,
        }
    }
}

/// The committed bundle manifest: one per `group_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BundleGroup {
    pub group_key: String,
    pub name: String,
    pub enabled: bool,
    pub priority: i64,
    pub apply_scope: ApplyScope,
    pub main_ids: Vec<ProductId>,
    pub product_ids: Vec<ProductId>,
    pub rate_tiers: Vec<BundleRateTier>,
    /// Products currently holding a projection of this group.
    pub targets: Vec<ProductId>,
    /// Version stamp shared by the manifest and every projection it wrote.
    pub version: String,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl BundleGroup {
    /// Builds the per-target projection for `target`.
    pub fn project(&self, target: ProductId) -> BundleRecord {
        BundleRecord {
            main_id: target,
            combo_ids: self
                .product_ids
                .iter()
                .copied()
                .filter(|id| *id != target)
                .collect(),
            rate_tiers: self.rate_tiers.clone(),
            group_key: self.group_key.clone(),
            name: self.name.clone(),
            enabled: self.enabled,
            version: self.version.clone(),
        }
    }
}

/// Per-target bundle projection, the only bundle data pricing ever reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BundleRecord {
    pub main_id: ProductId,
    /// `product_ids − {main_id}`, in bundle order.
    pub combo_ids: Vec<ProductId>,
    pub rate_tiers: Vec<BundleRateTier>,
    pub group_key: String,
    #[serde(default)]
    pub name: String,
    pub enabled: bool,
    pub version: String,
}

impl BundleRecord {
    /// What a storefront shows next to the anchor product.
    pub fn recommendation(&self) -> Recommendation {
        let mut recommended: Vec<ProductId> = self.combo_ids.clone();
        recommended.sort_unstable();
        recommended.dedup();
        Recommendation {
            product_id: self.main_id,
            group_key: Some(self.group_key.clone()),
            recommended_product_ids: recommended,
            rate_tiers: self.rate_tiers.clone(),
        }
    }
}

/// Bundle suggestion for a single product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Recommendation {
    pub product_id: ProductId,
    pub group_key: Option<String>,
    pub recommended_product_ids: Vec<ProductId>,
    pub rate_tiers: Vec<BundleRateTier>,
}

impl Recommendation {
    /// A product with no active bundle.
    pub fn empty(product_id: ProductId) -> Self {
        Recommendation {
            product_id,
            group_key: None,
            recommended_product_ids: Vec::new(),
            rate_tiers: Vec::new(),
        }
    }
}

// =============================================================================
// Rule payloads (what an owner holds)
// =============================================================================

/// All records held by one owner id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OwnerRules {
    pub owner_id: ProductId,
    pub quantity_discount: Option<QuantityDiscountConfig>,
    pub bundle: Option<BundleRecord>,
}

impl OwnerRules {
    pub fn is_empty(&self) -> bool {
        self.quantity_discount.is_none() && self.bundle.is_none()
    }

    /// Whether any of the owner's records is switched on.
    pub fn any_enabled(&self) -> bool {
        self.quantity_discount.as_ref().is_some_and(|c| c.enabled)
            || self.bundle.as_ref().is_some_and(|b| b.enabled)
    }
}

/// Validated write request, tagged by mechanism.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSpec {
    QuantityDiscount {
        enabled: bool,
        tiers: Vec<TierRule>,
    },
    BundleDiscount(GroupSpec),
}

impl RuleSpec {
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleSpec::QuantityDiscount { .. } => RuleKind::QuantityDiscount,
            RuleSpec::BundleDiscount(_) => RuleKind::BundleDiscount,
        }
    }
}

// =============================================================================
// Raw inputs (pre-validation)
// =============================================================================

/// Tier as typed by an admin. Validated by [`crate::validation::normalize_tiers`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierInput {
    pub min_qty: i64,
    pub rate: f64,
}

/// Bundle rate tier as typed by an admin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RateTierInput {
    pub min_items: i64,
    pub rate: f64,
}

/// Body of `PUT /rules/{owner_id}`.
///
/// `tiers` selects a quantity discount; any of the bundle fields selects a
/// bundle. Supplying both is rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(default)]
pub struct RuleDraft {
    pub enabled: Option<bool>,
    pub tiers: Option<Vec<TierInput>>,
    pub discount_rules: Option<Vec<RateTierInput>>,
    pub main_ids: Option<Vec<ProductId>>,
    pub product_ids: Option<Vec<ProductId>>,
    /// Legacy field: bundle items other than the mains.
    pub combo_ids: Option<Vec<ProductId>>,
    pub apply_scope: Option<ApplyScope>,
    pub priority: Option<i64>,
    pub name: Option<String>,
}

impl RuleDraft {
    pub(crate) fn has_bundle_fields(&self) -> bool {
        self.discount_rules.is_some()
            || self.main_ids.is_some()
            || self.product_ids.is_some()
            || self.combo_ids.is_some()
            || self.apply_scope.is_some()
    }
}

// =============================================================================
// Pricing inputs
// =============================================================================

/// Tier projection as stored on the product lookup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TierProjection {
    pub enabled: bool,
    pub tiers: Vec<TierRule>,
}

/// Everything pricing knows about one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductPromo {
    pub tier: Option<TierProjection>,
    pub bundle: Option<BundleRecord>,
}

/// Promo data for the products currently in a cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromoSnapshot {
    products: BTreeMap<ProductId, ProductPromo>,
}

impl PromoSnapshot {
    pub fn new() -> Self {
        PromoSnapshot::default()
    }

    pub fn insert(&mut self, product_id: ProductId, promo: ProductPromo) {
        self.products.insert(product_id, promo);
    }

    pub fn get(&self, product_id: ProductId) -> Option<&ProductPromo> {
        self.products.get(&product_id)
    }

    /// Enabled bundle projection anchored on `product_id`.
    pub fn bundle_for(&self, product_id: ProductId) -> Option<&BundleRecord> {
        self.get(product_id)
            .and_then(|p| p.bundle.as_ref())
            .filter(|b| b.enabled)
    }

    /// Enabled tiers for `product_id`.
    pub fn tiers_for(&self, product_id: ProductId) -> Option<&[TierRule]> {
        self.get(product_id)
            .and_then(|p| p.tier.as_ref())
            .filter(|t| t.enabled)
            .map(|t| t.tiers.as_slice())
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// One line of the host cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    /// Stable line identifier assigned by the cart.
    pub line_id: String,
    /// Parent product id; variations roll up to it.
    pub product_id: ProductId,
    pub variation_id: Option<ProductId>,
    pub quantity: u32,
    /// Current unit price (possibly discounted by a previous pass).
    pub unit_price: Money,
    /// Undiscounted unit price, written once by the first pricing pass.
    pub base_price: Option<Money>,
}

impl CartLine {
    /// The price every discount is computed from.
    pub fn effective_base(&self) -> Money {
        self.base_price.unwrap_or(self.unit_price)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn group(scope: ApplyScope) -> BundleGroup {
        BundleGroup {
            group_key: "k".to_string(),
            name: "Desk set".to_string(),
            enabled: true,
            priority: 0,
            apply_scope: scope,
            main_ids: vec![10],
            product_ids: vec![10, 11, 12],
            rate_tiers: vec![BundleRateTier {
                min_items: 2,
                rate: DiscountRate::from_bps(1000),
            }],
            targets: vec![10],
            version: "v1".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_discount_rate_from_fraction() {
        assert_eq!(DiscountRate::from_fraction(0.05), Some(DiscountRate::from_bps(500)));
        assert_eq!(DiscountRate::from_fraction(0.95), Some(DiscountRate::MAX));
        assert_eq!(DiscountRate::from_fraction(-0.1), None);
        assert_eq!(DiscountRate::from_fraction(f64::NAN), None);
        assert_eq!(DiscountRate::from_fraction(1.5), None);
    }

    #[test]
    fn test_discount_rate_serializes_as_fraction() {
        let json = serde_json::to_string(&DiscountRate::from_bps(1250)).unwrap();
        assert_eq!(json, "0.125");

        let rate: DiscountRate = serde_json::from_str("0.1").unwrap();
        assert_eq!(rate.bps(), 1000);

        assert!(serde_json::from_str::<DiscountRate>("-0.2").is_err());
    }

    #[test]
    fn test_discount_rate_display() {
        assert_eq!(DiscountRate::from_bps(525).to_string(), "5.25%");
    }

    #[test]
    fn test_project_excludes_target_from_combo_ids() {
        let record = group(ApplyScope::MainOnly).project(10);
        assert_eq!(record.main_id, 10);
        assert_eq!(record.combo_ids, vec![11, 12]);
        assert_eq!(record.version, "v1");
    }

    #[test]
    fn test_group_spec_targets_follow_scope() {
        let spec = GroupSpec {
            name: String::new(),
            enabled: true,
            priority: 0,
            apply_scope: ApplyScope::MainOnly,
            main_ids: vec![10],
            product_ids: vec![10, 11],
            rate_tiers: vec![],
        };
        assert_eq!(spec.targets(), &[10]);

        let all = GroupSpec {
            apply_scope: ApplyScope::AllInCombo,
            ..spec
        };
        assert_eq!(all.targets(), &[10, 11]);
    }

    #[test]
    fn test_apply_scope_accepts_legacy_spelling() {
        let scope: ApplyScope = serde_json::from_str("\"ALL_IN_COMBO\"").unwrap();
        assert_eq!(scope, ApplyScope::AllInCombo);
        let scope: ApplyScope = serde_json::from_str("\"main_only\"").unwrap();
        assert_eq!(scope, ApplyScope::MainOnly);
    }

    #[test]
    fn test_tier_stats() {
        let config = QuantityDiscountConfig {
            owner_id: 1,
            enabled: true,
            tiers: vec![
                TierRule { min_qty: 2, rate: DiscountRate::from_bps(500) },
                TierRule { min_qty: 5, rate: DiscountRate::from_bps(1000) },
            ],
            updated_at: Utc::now(),
        };
        let stats = config.stats();
        assert_eq!(stats.tier_count, 2);
        assert_eq!(stats.max_rate.bps(), 1000);
        assert_eq!(stats.min_qty_min, Some(2));
        assert_eq!(stats.min_qty_max, Some(5));
    }

    #[test]
    fn test_recommendation_sorted() {
        let mut g = group(ApplyScope::MainOnly);
        g.product_ids = vec![10, 12, 11];
        let rec = g.project(10).recommendation();
        assert_eq!(rec.recommended_product_ids, vec![11, 12]);
        assert_eq!(rec.group_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_snapshot_ignores_disabled_rules() {
        let mut snapshot = PromoSnapshot::new();
        let mut record = group(ApplyScope::MainOnly).project(10);
        record.enabled = false;
        snapshot.insert(
            10,
            ProductPromo {
                tier: Some(TierProjection { enabled: false, tiers: vec![] }),
                bundle: Some(record),
            },
        );
        assert!(snapshot.bundle_for(10).is_none());
        assert!(snapshot.tiers_for(10).is_none());
    }

    #[test]
    fn test_rule_filter_matches() {
        let rules = OwnerRules {
            owner_id: 10,
            quantity_discount: None,
            bundle: Some(group(ApplyScope::MainOnly).project(10)),
        };
        assert!(RuleFilter::All.matches(&rules));
        assert!(RuleFilter::Enabled.matches(&rules));
        assert!(!RuleFilter::Disabled.matches(&rules));
        assert!(RuleFilter::Bundle.matches(&rules));
        assert!(!RuleFilter::Quantity.matches(&rules));
    }
}

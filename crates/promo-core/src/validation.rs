//! # Validation Module
//!
//! Turns raw admin input into validated rule specs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler                                                 │
//! │  └── JSON shape (deserialization into RuleDraft)                       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (pure)                                           │
//! │  ├── classify: tiers XOR bundle fields → RuleSpec                      │
//! │  ├── normalize_tiers: range, clamp, dedupe, sort                       │
//! │  └── normalize_group: legacy fields, ≥2 products, mains ⊆ products     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Rule store (promo-db)                                        │
//! │  ├── Catalog existence of every referenced id                          │
//! │  └── Transactional write                                               │
//! │                                                                         │
//! │  Any failure here aborts before a single row is touched.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use promo_core::types::{RuleDraft, RuleSpec, TierInput};
//! use promo_core::validation::classify;
//!
//! let draft = RuleDraft {
//!     tiers: Some(vec![TierInput { min_qty: 2, rate: 0.05 }]),
//!     ..RuleDraft::default()
//! };
//! let spec = classify(66299, &draft).unwrap();
//! assert!(matches!(spec, RuleSpec::QuantityDiscount { .. }));
//! ```

use std::collections::{BTreeMap, HashSet};

use crate::error::ValidationError;
use crate::types::{
    ApplyScope, BundleRateTier, DiscountRate, GroupSpec, ProductId, RateTierInput, RuleDraft,
    RuleFilter, RuleKind, RuleSpec, TierInput, TierRule,
};
use crate::{
    DEFAULT_PAGE_SIZE, MAX_DISCOUNT_FRACTION, MAX_ITEM_QUANTITY, MAX_THRESHOLD, MIN_THRESHOLD,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest accepted bundle name.
const MAX_NAME_LEN: usize = 200;

// =============================================================================
// Scalars
// =============================================================================

/// Validates a catalog id (must be positive).
pub fn validate_product_id(field: &str, id: ProductId) -> ValidationResult<ProductId> {
    if id <= 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: i64::MAX,
        });
    }
    Ok(id)
}

/// Validates a cart quantity.
///
/// ## Example
/// ```rust
/// use promo_core::validation::validate_quantity;
///
/// assert_eq!(validate_quantity(3).unwrap(), 3);
/// assert!(validate_quantity(0).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<u32> {
    if quantity < 1 || quantity > MAX_ITEM_QUANTITY as i64 {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY as i64,
        });
    }
    Ok(quantity as u32)
}

fn threshold(field: &str, value: i64) -> ValidationResult<u32> {
    if value < MIN_THRESHOLD as i64 || value > MAX_THRESHOLD as i64 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: MIN_THRESHOLD as i64,
            max: MAX_THRESHOLD as i64,
        });
    }
    Ok(value as u32)
}

fn rate_error(field: &str, value: f64) -> ValidationError {
    ValidationError::RateOutOfRange {
        field: field.to_string(),
        value,
        max: MAX_DISCOUNT_FRACTION,
    }
}

/// Tier rates above the ceiling (but still a fraction) are clamped to it.
fn clamped_rate(field: &str, value: f64) -> ValidationResult<DiscountRate> {
    if !value.is_finite() || value <= 0.0 {
        return Err(rate_error(field, value));
    }
    let rate = DiscountRate::from_fraction(value).ok_or_else(|| rate_error(field, value))?;
    if rate.is_zero() {
        return Err(rate_error(field, value));
    }
    Ok(rate.min(DiscountRate::MAX))
}

/// Bundle rates must already sit in (0, 0.95].
fn strict_rate(field: &str, value: f64) -> ValidationResult<DiscountRate> {
    if !value.is_finite() || value <= 0.0 || value > MAX_DISCOUNT_FRACTION {
        return Err(rate_error(field, value));
    }
    match DiscountRate::from_fraction(value) {
        Some(rate) if !rate.is_zero() => Ok(rate.min(DiscountRate::MAX)),
        _ => Err(rate_error(field, value)),
    }
}

// =============================================================================
// Tiers
// =============================================================================

/// Validates quantity tiers.
///
/// ## Rules
/// - At least one tier
/// - `min_qty` in `2..=10000`
/// - `rate` in `(0, 1]`; anything above 0.95 is clamped to 0.95
/// - An exact repeat of a tier is dropped; two different rates for the
///   same `min_qty` are rejected
/// - Output is sorted by `min_qty` ascending
pub fn normalize_tiers(inputs: &[TierInput]) -> ValidationResult<Vec<TierRule>> {
    if inputs.is_empty() {
        return Err(ValidationError::Required {
            field: "tiers".to_string(),
        });
    }

    let mut by_qty: BTreeMap<u32, DiscountRate> = BTreeMap::new();
    for input in inputs {
        let min_qty = threshold("tiers.min_qty", input.min_qty)?;
        let rate = clamped_rate("tiers.rate", input.rate)?;
        match by_qty.get(&min_qty) {
            Some(existing) if *existing != rate => {
                return Err(ValidationError::Duplicate {
                    field: "tiers.min_qty".to_string(),
                    value: min_qty.to_string(),
                });
            }
            Some(_) => continue,
            None => {
                by_qty.insert(min_qty, rate);
            }
        }
    }

    Ok(by_qty
        .into_iter()
        .map(|(min_qty, rate)| TierRule { min_qty, rate })
        .collect())
}

/// Validates bundle rate tiers. Empty is allowed (the bundle never
/// qualifies); duplicates of `min_items` are rejected.
pub fn normalize_rate_tiers(inputs: &[RateTierInput]) -> ValidationResult<Vec<BundleRateTier>> {
    let mut by_count: BTreeMap<u32, DiscountRate> = BTreeMap::new();
    for input in inputs {
        let min_items = threshold("discount_rules.min_items", input.min_items)?;
        let rate = strict_rate("discount_rules.rate", input.rate)?;
        if by_count.insert(min_items, rate).is_some() {
            return Err(ValidationError::Duplicate {
                field: "discount_rules.min_items".to_string(),
                value: min_items.to_string(),
            });
        }
    }

    Ok(by_count
        .into_iter()
        .map(|(min_items, rate)| BundleRateTier { min_items, rate })
        .collect())
}

// =============================================================================
// Bundles
// =============================================================================

/// Removes repeated ids, keeping the first occurrence.
pub fn dedupe_ids(ids: &[ProductId]) -> Vec<ProductId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn validate_ids(field: &str, ids: &[ProductId]) -> ValidationResult<()> {
    for id in ids {
        validate_product_id(field, *id)?;
    }
    Ok(())
}

fn normalize_name(name: Option<&str>) -> ValidationResult<String> {
    let name = name.unwrap_or("").trim();
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }
    Ok(name.to_string())
}

/// Validates and normalizes a bundle written through `owner_id`.
///
/// ## Normalization
/// ```text
/// main_ids empty, MAIN_ONLY     → main_ids = [owner_id]
/// product_ids empty             → product_ids = main_ids ∪ combo_ids
/// ALL_IN_COMBO                  → main_ids = product_ids
/// repeated ids                  → first occurrence kept
/// ```
///
/// ## Rules
/// - At least 2 distinct products
/// - Every main id is a product id
/// - `owner_id` is one of the bundle's targets
pub fn normalize_group(owner_id: ProductId, draft: &RuleDraft) -> ValidationResult<GroupSpec> {
    let scope = draft.apply_scope.unwrap_or_default();

    let mut main_ids = dedupe_ids(draft.main_ids.as_deref().unwrap_or_default());
    let combo_ids = dedupe_ids(draft.combo_ids.as_deref().unwrap_or_default());
    let mut product_ids = dedupe_ids(draft.product_ids.as_deref().unwrap_or_default());

    validate_ids("main_ids", &main_ids)?;
    validate_ids("combo_ids", &combo_ids)?;
    validate_ids("product_ids", &product_ids)?;

    if main_ids.is_empty() && scope == ApplyScope::MainOnly {
        main_ids.push(owner_id);
    }

    if product_ids.is_empty() {
        let legacy: Vec<ProductId> = main_ids.iter().chain(combo_ids.iter()).copied().collect();
        product_ids = dedupe_ids(&legacy);
    }

    if scope == ApplyScope::AllInCombo {
        main_ids = product_ids.clone();
    }

    if product_ids.len() < 2 {
        return Err(ValidationError::TooFewItems {
            field: "product_ids".to_string(),
            min: 2,
            actual: product_ids.len(),
        });
    }

    let missing: Vec<ProductId> = main_ids
        .iter()
        .copied()
        .filter(|id| !product_ids.contains(id))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::NotSubset {
            field: "main_ids".to_string(),
            superset: "product_ids".to_string(),
            missing,
        });
    }

    let spec = GroupSpec {
        name: normalize_name(draft.name.as_deref())?,
        enabled: draft.enabled.unwrap_or(true),
        priority: draft.priority.unwrap_or(0),
        apply_scope: scope,
        main_ids,
        product_ids,
        rate_tiers: normalize_rate_tiers(draft.discount_rules.as_deref().unwrap_or_default())?,
    };

    if !spec.targets().contains(&owner_id) {
        return Err(ValidationError::InvalidFormat {
            field: "owner_id".to_string(),
            reason: format!("product {owner_id} is not a target of this bundle"),
        });
    }

    Ok(spec)
}

// =============================================================================
// Rule drafts
// =============================================================================

/// Validates a `PUT /rules/{owner_id}` body into a tagged [`RuleSpec`].
pub fn classify(owner_id: ProductId, draft: &RuleDraft) -> ValidationResult<RuleSpec> {
    validate_product_id("owner_id", owner_id)?;

    match (&draft.tiers, draft.has_bundle_fields()) {
        (Some(_), true) => Err(ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: "tiers cannot be combined with bundle fields".to_string(),
        }),
        (Some(tiers), false) => Ok(RuleSpec::QuantityDiscount {
            enabled: draft.enabled.unwrap_or(true),
            tiers: normalize_tiers(tiers)?,
        }),
        (None, true) => Ok(RuleSpec::BundleDiscount(normalize_group(owner_id, draft)?)),
        (None, false) => Err(ValidationError::Required {
            field: "tiers or product_ids".to_string(),
        }),
    }
}

// =============================================================================
// Paging
// =============================================================================

/// A bounded page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.per_page as u64
    }
}

/// Clamps paging input: page ≥ 1, `1 ≤ per_page ≤ max_per_page`.
pub fn normalize_page(page: Option<i64>, per_page: Option<i64>, max_per_page: u32) -> PageRequest {
    let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
    let per_page = per_page
        .unwrap_or(DEFAULT_PAGE_SIZE as i64)
        .clamp(1, max_per_page.max(1) as i64) as u32;
    PageRequest { page, per_page }
}

// =============================================================================
// Query values
// =============================================================================

fn one_of<T: Copy>(field: &str, raw: &str, options: &[(&str, T)]) -> ValidationResult<T> {
    let raw = raw.trim();
    options
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(raw))
        .map(|(_, value)| *value)
        .ok_or_else(|| ValidationError::NotAllowed {
            field: field.to_string(),
            allowed: options.iter().map(|(name, _)| name.to_string()).collect(),
        })
}

/// Parses a listing `filter` query value.
pub fn parse_filter(raw: &str) -> ValidationResult<RuleFilter> {
    one_of(
        "filter",
        raw,
        &[
            ("all", RuleFilter::All),
            ("enabled", RuleFilter::Enabled),
            ("disabled", RuleFilter::Disabled),
            ("quantity", RuleFilter::Quantity),
            ("bundle", RuleFilter::Bundle),
        ],
    )
}

/// Parses a `kind` query value.
pub fn parse_kind(raw: &str) -> ValidationResult<RuleKind> {
    one_of(
        "kind",
        raw,
        &[
            (RuleKind::QuantityDiscount.as_str(), RuleKind::QuantityDiscount),
            (RuleKind::BundleDiscount.as_str(), RuleKind::BundleDiscount),
        ],
    )
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn tier(min_qty: i64, rate: f64) -> TierInput {
        TierInput { min_qty, rate }
    }

    fn rule(min_items: i64, rate: f64) -> RateTierInput {
        RateTierInput { min_items, rate }
    }

    #[test]
    fn test_normalize_tiers_sorts_ascending() {
        let tiers = normalize_tiers(&[tier(5, 0.10), tier(2, 0.05)]).unwrap();
        assert_eq!(tiers[0].min_qty, 2);
        assert_eq!(tiers[1].min_qty, 5);
        assert_eq!(tiers[1].rate.bps(), 1000);
    }

    #[test]
    fn test_normalize_tiers_clamps_rate() {
        let tiers = normalize_tiers(&[tier(2, 0.99)]).unwrap();
        assert_eq!(tiers[0].rate, DiscountRate::MAX);
    }

    #[test]
    fn test_normalize_tiers_drops_exact_repeat() {
        let tiers = normalize_tiers(&[tier(2, 0.05), tier(2, 0.05)]).unwrap();
        assert_eq!(tiers.len(), 1);
    }

    #[test]
    fn test_normalize_tiers_rejects_conflicting_duplicate() {
        let err = normalize_tiers(&[tier(2, 0.05), tier(2, 0.10)]).unwrap_err();
        assert_matches!(err, ValidationError::Duplicate { .. });
    }

    #[test]
    fn test_normalize_tiers_rejects_bad_input() {
        assert_matches!(normalize_tiers(&[]), Err(ValidationError::Required { .. }));
        assert_matches!(
            normalize_tiers(&[tier(1, 0.05)]),
            Err(ValidationError::OutOfRange { .. })
        );
        assert_matches!(
            normalize_tiers(&[tier(2, 0.0)]),
            Err(ValidationError::RateOutOfRange { .. })
        );
        assert_matches!(
            normalize_tiers(&[tier(2, 1.5)]),
            Err(ValidationError::RateOutOfRange { .. })
        );
        assert_matches!(
            normalize_tiers(&[tier(2, f64::NAN)]),
            Err(ValidationError::RateOutOfRange { .. })
        );
    }

    #[test]
    fn test_normalize_rate_tiers() {
        let tiers = normalize_rate_tiers(&[rule(3, 0.15), rule(2, 0.10)]).unwrap();
        assert_eq!(tiers[0].min_items, 2);
        assert_eq!(tiers[1].rate.bps(), 1500);

        assert!(normalize_rate_tiers(&[]).unwrap().is_empty());
        assert_matches!(
            normalize_rate_tiers(&[rule(2, 0.96)]),
            Err(ValidationError::RateOutOfRange { .. })
        );
        assert_matches!(
            normalize_rate_tiers(&[rule(2, 0.1), rule(2, 0.2)]),
            Err(ValidationError::Duplicate { .. })
        );
    }

    #[test]
    fn test_dedupe_ids_keeps_first_occurrence() {
        assert_eq!(dedupe_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn test_normalize_group_main_only() {
        let draft = RuleDraft {
            main_ids: Some(vec![10]),
            product_ids: Some(vec![10, 11, 12, 11]),
            discount_rules: Some(vec![rule(2, 0.10)]),
            ..RuleDraft::default()
        };
        let spec = normalize_group(10, &draft).unwrap();
        assert_eq!(spec.product_ids, vec![10, 11, 12]);
        assert_eq!(spec.targets(), &[10]);
        assert!(spec.enabled);
    }

    #[test]
    fn test_normalize_group_legacy_fields() {
        let draft = RuleDraft {
            combo_ids: Some(vec![11, 12]),
            ..RuleDraft::default()
        };
        let spec = normalize_group(10, &draft).unwrap();
        assert_eq!(spec.main_ids, vec![10]);
        assert_eq!(spec.product_ids, vec![10, 11, 12]);
    }

    #[test]
    fn test_normalize_group_all_in_combo_targets_every_product() {
        let draft = RuleDraft {
            apply_scope: Some(ApplyScope::AllInCombo),
            product_ids: Some(vec![10, 11]),
            ..RuleDraft::default()
        };
        let spec = normalize_group(11, &draft).unwrap();
        assert_eq!(spec.main_ids, vec![10, 11]);
        assert_eq!(spec.targets(), &[10, 11]);
    }

    #[test]
    fn test_normalize_group_rejects_small_bundle() {
        let draft = RuleDraft {
            product_ids: Some(vec![10, 10]),
            ..RuleDraft::default()
        };
        assert_matches!(
            normalize_group(10, &draft),
            Err(ValidationError::TooFewItems { actual: 1, .. })
        );
    }

    #[test]
    fn test_normalize_group_rejects_main_outside_products() {
        let draft = RuleDraft {
            main_ids: Some(vec![10, 99]),
            product_ids: Some(vec![10, 11]),
            ..RuleDraft::default()
        };
        let err = normalize_group(10, &draft).unwrap_err();
        assert_matches!(err, ValidationError::NotSubset { ref missing, .. } if missing == &vec![99]);
    }

    #[test]
    fn test_normalize_group_rejects_owner_not_target() {
        let draft = RuleDraft {
            main_ids: Some(vec![10]),
            product_ids: Some(vec![10, 11]),
            ..RuleDraft::default()
        };
        assert_matches!(
            normalize_group(11, &draft),
            Err(ValidationError::InvalidFormat { .. })
        );
    }

    #[test]
    fn test_classify() {
        let tiers = RuleDraft {
            tiers: Some(vec![tier(2, 0.05)]),
            enabled: Some(false),
            ..RuleDraft::default()
        };
        assert_matches!(
            classify(1, &tiers),
            Ok(RuleSpec::QuantityDiscount { enabled: false, .. })
        );

        let both = RuleDraft {
            tiers: Some(vec![tier(2, 0.05)]),
            product_ids: Some(vec![1, 2]),
            ..RuleDraft::default()
        };
        assert_matches!(classify(1, &both), Err(ValidationError::InvalidFormat { .. }));

        assert_matches!(
            classify(1, &RuleDraft::default()),
            Err(ValidationError::Required { .. })
        );
        assert_matches!(classify(0, &tiers), Err(ValidationError::OutOfRange { .. }));
    }

    #[test]
    fn test_normalize_page() {
        assert_eq!(
            normalize_page(None, None, 100),
            PageRequest { page: 1, per_page: 50 }
        );
        assert_eq!(
            normalize_page(Some(0), Some(500), 100),
            PageRequest { page: 1, per_page: 100 }
        );
        assert_eq!(normalize_page(Some(3), Some(20), 100).offset(), 40);
    }

    #[test]
    fn test_parse_query_values() {
        assert_eq!(parse_filter("Bundle").unwrap(), RuleFilter::Bundle);
        assert_eq!(parse_kind("quantity_discount").unwrap(), RuleKind::QuantityDiscount);

        let err = parse_filter("everything").unwrap_err();
        assert_eq!(err.reason(), "not_allowed");
        assert_matches!(err, ValidationError::NotAllowed { ref allowed, .. } if allowed.len() == 5);
        assert_matches!(parse_kind("tiers"), Err(ValidationError::NotAllowed { .. }));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY as i64 + 1).is_err());
    }
}

//! # Bundle Resolver
//!
//! Finds the bundles that qualify in a cart without counting any product
//! twice.
//!
//! ```text
//! present = {10, 11, 12}
//!
//! anchor 10 (combo 11,12)   eligible = {10} ∪ ({11,12} ∩ present − used)
//!                           count 3 → pick(rate_tiers, 3) > 0 → qualifies
//!                           used ← {10, 11, 12}
//!
//! anchor 11 (combo 10)      11 ∈ used → skipped
//! ```
//!
//! Anchors are visited in ascending product id order so the outcome does
//! not depend on cart line order. Bundles count distinct products, never
//! quantities.

use std::collections::BTreeSet;

use serde::Serialize;
use ts_rs::TS;

use super::tiers::pick;
use crate::types::{DiscountRate, ProductId, PromoSnapshot};
use crate::MIN_THRESHOLD;

/// A bundle that qualified in this pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct BundleHit {
    pub group_key: String,
    pub name: String,
    pub anchor: ProductId,
    /// Distinct products consumed by this bundle.
    pub members: BTreeSet<ProductId>,
    pub rate: DiscountRate,
}

/// Qualifying bundles plus the products they cover.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleResolution {
    pub hits: Vec<BundleHit>,
    pub covered: BTreeSet<ProductId>,
}

impl BundleResolution {
    pub fn is_covered(&self, product_id: ProductId) -> bool {
        self.covered.contains(&product_id)
    }

    /// The hit that consumed `product_id`, if any.
    pub fn hit_for(&self, product_id: ProductId) -> Option<&BundleHit> {
        self.hits.iter().find(|h| h.members.contains(&product_id))
    }
}

/// Resolves qualifying bundles among the `present` products.
pub fn resolve_bundles(snapshot: &PromoSnapshot, present: &BTreeSet<ProductId>) -> BundleResolution {
    let mut resolution = BundleResolution::default();

    for anchor in present.iter().copied() {
        let Some(record) = snapshot.bundle_for(anchor) else {
            continue;
        };
        if resolution.covered.contains(&anchor) {
            continue;
        }

        let mut eligible = BTreeSet::from([anchor]);
        eligible.extend(
            record
                .combo_ids
                .iter()
                .copied()
                .filter(|id| present.contains(id) && !resolution.covered.contains(id)),
        );

        let count = eligible.len() as u32;
        if count < MIN_THRESHOLD {
            continue;
        }
        let rate = pick(&record.rate_tiers, count);
        if rate.is_zero() {
            continue;
        }

        resolution.covered.extend(eligible.iter().copied());
        resolution.hits.push(BundleHit {
            group_key: record.group_key.clone(),
            name: record.name.clone(),
            anchor,
            members: eligible,
            rate,
        });
    }

    resolution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BundleRateTier, BundleRecord, ProductPromo};

    fn record(main_id: ProductId, combo_ids: &[ProductId], tiers: &[(u32, u32)]) -> BundleRecord {
        BundleRecord {
            main_id,
            combo_ids: combo_ids.to_vec(),
            rate_tiers: tiers
                .iter()
                .map(|(min_items, bps)| BundleRateTier {
                    min_items: *min_items,
                    rate: DiscountRate::from_bps(*bps),
                })
                .collect(),
            group_key: format!("g{main_id}"),
            name: String::new(),
            enabled: true,
            version: "v1".to_string(),
        }
    }

    fn snapshot(records: Vec<BundleRecord>) -> PromoSnapshot {
        let mut snapshot = PromoSnapshot::new();
        for r in records {
            snapshot.insert(r.main_id, ProductPromo { tier: None, bundle: Some(r) });
        }
        snapshot
    }

    fn present(ids: &[ProductId]) -> BTreeSet<ProductId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_two_present_products_qualify() {
        let snap = snapshot(vec![record(10, &[11, 12], &[(2, 1000)])]);
        let res = resolve_bundles(&snap, &present(&[10, 11]));
        assert_eq!(res.hits.len(), 1);
        assert_eq!(res.hits[0].members, present(&[10, 11]));
        assert_eq!(res.hits[0].rate.bps(), 1000);
        assert!(res.is_covered(11));
        assert!(!res.is_covered(12));
    }

    #[test]
    fn test_third_product_keeps_rate_without_higher_tier() {
        let snap = snapshot(vec![record(10, &[11, 12], &[(2, 1000)])]);
        let res = resolve_bundles(&snap, &present(&[10, 11, 12]));
        assert_eq!(res.hits[0].members.len(), 3);
        assert_eq!(res.hits[0].rate.bps(), 1000);

        let snap = snapshot(vec![record(10, &[11, 12], &[(2, 1000), (3, 1500)])]);
        let res = resolve_bundles(&snap, &present(&[10, 11, 12]));
        assert_eq!(res.hits[0].rate.bps(), 1500);
    }

    #[test]
    fn test_anchor_alone_does_not_qualify() {
        let snap = snapshot(vec![record(10, &[11], &[(2, 1000)])]);
        let res = resolve_bundles(&snap, &present(&[10]));
        assert!(res.hits.is_empty());
        assert!(res.covered.is_empty());
    }

    #[test]
    fn test_zero_rate_does_not_qualify() {
        let snap = snapshot(vec![record(10, &[11, 12], &[(3, 1000)])]);
        let res = resolve_bundles(&snap, &present(&[10, 11]));
        assert!(res.hits.is_empty());
    }

    #[test]
    fn test_used_products_are_not_counted_twice() {
        // 10 consumes 11; 12's bundle with 11 then has only itself left.
        let snap = snapshot(vec![
            record(10, &[11], &[(2, 1000)]),
            record(12, &[11], &[(2, 2000)]),
        ]);
        let res = resolve_bundles(&snap, &present(&[10, 11, 12]));
        assert_eq!(res.hits.len(), 1);
        assert_eq!(res.hits[0].anchor, 10);
        assert!(!res.is_covered(12));
    }

    #[test]
    fn test_all_in_combo_group_counts_once() {
        let snap = snapshot(vec![
            record(10, &[11], &[(2, 1000)]),
            record(11, &[10], &[(2, 1000)]),
        ]);
        let res = resolve_bundles(&snap, &present(&[10, 11]));
        assert_eq!(res.hits.len(), 1);
        assert_eq!(res.hit_for(11).map(|h| h.anchor), Some(10));
    }

    #[test]
    fn test_disabled_bundle_is_ignored() {
        let mut r = record(10, &[11], &[(2, 1000)]);
        r.enabled = false;
        let res = resolve_bundles(&snapshot(vec![r]), &present(&[10, 11]));
        assert!(res.hits.is_empty());
    }
}

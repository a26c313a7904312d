//! # Exclusivity Resolver
//!
//! At most one mechanism discounts a product in a pass.
//!
//! ```text
//! Phase 1 (coverage)   bundle hits ──► Decision::Bundle for every member
//! Phase 2 (tiers)      remaining products ──► pick(own tiers, quantity)
//! ```
//!
//! A covered product never reaches phase 2, so it can never receive its
//! tier rate on top of (or instead of) its bundle rate.

use std::collections::BTreeMap;

use serde::Serialize;
use ts_rs::TS;

use super::bundle::BundleResolution;
use super::tiers::pick;
use crate::types::{DiscountRate, ProductId, PromoSnapshot};

/// The discount chosen for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(tag = "mechanism", rename_all = "snake_case")]
pub enum Decision {
    Bundle { group_key: String, rate: DiscountRate },
    Tier { rate: DiscountRate, quantity: u32 },
    None,
}

impl Decision {
    pub fn rate(&self) -> DiscountRate {
        match self {
            Decision::Bundle { rate, .. } | Decision::Tier { rate, .. } => *rate,
            Decision::None => DiscountRate::zero(),
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, Decision::Bundle { .. })
    }
}

/// Phase 1: every product consumed by a qualifying bundle gets its rate.
pub fn coverage_phase(bundles: &BundleResolution) -> BTreeMap<ProductId, Decision> {
    let mut decisions = BTreeMap::new();
    for hit in &bundles.hits {
        for member in &hit.members {
            decisions.insert(
                *member,
                Decision::Bundle {
                    group_key: hit.group_key.clone(),
                    rate: hit.rate,
                },
            );
        }
    }
    decisions
}

/// Phase 2: uncovered products fall back to their own enabled tiers.
pub fn tier_phase(
    snapshot: &PromoSnapshot,
    quantities: &BTreeMap<ProductId, u32>,
    bundles: &BundleResolution,
) -> BTreeMap<ProductId, Decision> {
    quantities
        .iter()
        .filter(|(product_id, _)| !bundles.is_covered(**product_id))
        .map(|(product_id, quantity)| {
            let rate = snapshot
                .tiers_for(*product_id)
                .map(|tiers| pick(tiers, *quantity))
                .unwrap_or_default();
            let decision = if rate.is_zero() {
                Decision::None
            } else {
                Decision::Tier { rate, quantity: *quantity }
            };
            (*product_id, decision)
        })
        .collect()
}

/// Both phases merged: one decision per product present in the cart.
pub fn resolve_exclusivity(
    snapshot: &PromoSnapshot,
    quantities: &BTreeMap<ProductId, u32>,
    bundles: &BundleResolution,
) -> BTreeMap<ProductId, Decision> {
    let mut decisions = coverage_phase(bundles);
    decisions.extend(tier_phase(snapshot, quantities, bundles));
    decisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::bundle::BundleHit;
    use crate::types::{ProductPromo, TierProjection, TierRule};
    use std::collections::BTreeSet;

    fn tier_snapshot(product_id: ProductId, min_qty: u32, bps: u32) -> PromoSnapshot {
        let mut snapshot = PromoSnapshot::new();
        snapshot.insert(
            product_id,
            ProductPromo {
                tier: Some(TierProjection {
                    enabled: true,
                    tiers: vec![TierRule { min_qty, rate: DiscountRate::from_bps(bps) }],
                }),
                bundle: None,
            },
        );
        snapshot
    }

    fn covering(members: &[ProductId], bps: u32) -> BundleResolution {
        let members: BTreeSet<ProductId> = members.iter().copied().collect();
        BundleResolution {
            covered: members.clone(),
            hits: vec![BundleHit {
                group_key: "g".to_string(),
                name: String::new(),
                anchor: *members.iter().next().unwrap(),
                members,
                rate: DiscountRate::from_bps(bps),
            }],
        }
    }

    #[test]
    fn test_coverage_phase_marks_every_member() {
        let decisions = coverage_phase(&covering(&[10, 11], 1000));
        assert_eq!(decisions.len(), 2);
        assert!(decisions.values().all(|d| d.is_bundle()));
        assert_eq!(decisions[&11].rate().bps(), 1000);
    }

    #[test]
    fn test_tier_phase_uses_own_tiers() {
        let snapshot = tier_snapshot(10, 2, 500);
        let quantities = BTreeMap::from([(10, 3), (11, 5)]);
        let decisions = tier_phase(&snapshot, &quantities, &BundleResolution::default());
        assert_eq!(
            decisions[&10],
            Decision::Tier { rate: DiscountRate::from_bps(500), quantity: 3 }
        );
        assert_eq!(decisions[&11], Decision::None);
    }

    #[test]
    fn test_tier_phase_below_threshold_is_none() {
        let snapshot = tier_snapshot(10, 2, 500);
        let quantities = BTreeMap::from([(10, 1)]);
        let decisions = tier_phase(&snapshot, &quantities, &BundleResolution::default());
        assert_eq!(decisions[&10], Decision::None);
    }

    #[test]
    fn test_covered_product_never_gets_tier_rate() {
        // 11 has a richer tier than the bundle, but the bundle wins.
        let snapshot = tier_snapshot(11, 2, 3000);
        let quantities = BTreeMap::from([(10, 1), (11, 4)]);
        let decisions = resolve_exclusivity(&snapshot, &quantities, &covering(&[10, 11], 1000));
        assert!(decisions[&11].is_bundle());
        assert_eq!(decisions[&11].rate().bps(), 1000);
    }
}

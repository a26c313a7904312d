//! # Tier Selector
//!
//! Threshold → rate lookup shared by both mechanisms:
//!
//! ```text
//! quantity tiers       pick(tiers,      aggregated quantity)
//! bundle rate tiers    pick(rate_tiers, distinct eligible products)
//! ```

use crate::types::{DiscountRate, Threshold};

/// Returns the rate of the tier with the greatest threshold `≤ count`, or
/// zero when no tier is reached.
///
/// Tiers are stored ascending, so this is the last tier reached in a scan;
/// unsorted input still yields the greatest reached threshold.
///
/// ## Example
/// ```rust
/// use promo_core::pricing::tiers::pick;
/// use promo_core::types::{DiscountRate, TierRule};
///
/// let tiers = [
///     TierRule { min_qty: 2, rate: DiscountRate::from_bps(500) },
///     TierRule { min_qty: 5, rate: DiscountRate::from_bps(1000) },
/// ];
/// assert_eq!(pick(&tiers, 1), DiscountRate::zero());
/// assert_eq!(pick(&tiers, 4).bps(), 500);
/// assert_eq!(pick(&tiers, 5).bps(), 1000);
/// ```
pub fn pick<T: Threshold>(tiers: &[T], count: u32) -> DiscountRate {
    tiers
        .iter()
        .filter(|tier| tier.threshold() <= count)
        .max_by_key(|tier| tier.threshold())
        .map(|tier| tier.rate())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BundleRateTier, TierRule};

    fn tiers() -> Vec<TierRule> {
        vec![
            TierRule { min_qty: 2, rate: DiscountRate::from_bps(500) },
            TierRule { min_qty: 5, rate: DiscountRate::from_bps(1000) },
        ]
    }

    #[test]
    fn test_pick_below_first_tier_is_zero() {
        assert!(pick(&tiers(), 0).is_zero());
        assert!(pick(&tiers(), 1).is_zero());
    }

    #[test]
    fn test_pick_keeps_last_reached_tier() {
        assert_eq!(pick(&tiers(), 2).bps(), 500);
        assert_eq!(pick(&tiers(), 4).bps(), 500);
        assert_eq!(pick(&tiers(), 5).bps(), 1000);
        assert_eq!(pick(&tiers(), 500).bps(), 1000);
    }

    #[test]
    fn test_pick_on_unsorted_tiers() {
        let mut reversed = tiers();
        reversed.reverse();
        assert_eq!(pick(&reversed, 6).bps(), 1000);
    }

    #[test]
    fn test_pick_on_bundle_rate_tiers() {
        let rate_tiers = [BundleRateTier { min_items: 2, rate: DiscountRate::from_bps(1000) }];
        assert_eq!(pick(&rate_tiers, 3).bps(), 1000);
        assert!(pick::<BundleRateTier>(&[], 3).is_zero());
    }
}

//! # Pricing Pipeline
//!
//! Recomputes every promo price in a cart from scratch.
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  aggregate │──►│   bundle   │──►│ exclusivity  │──►│    apply    │
//! │ qty / prod │   │  resolver  │   │ cover → tier │   │ prices/fees │
//! └────────────┘   └────────────┘   └──────────────┘   └─────────────┘
//!       ▲                 ▲                 ▲
//!   Cart.lines()     PromoSnapshot     PromoSnapshot
//! ```
//!
//! The pass is synchronous and never fails: missing or odd rule data
//! leaves prices at base and is logged.

pub mod aggregate;
pub mod apply;
pub mod bundle;
pub mod exclusivity;
pub mod tiers;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;
use ts_rs::TS;

use crate::cart::Cart;
use crate::money::Money;
use crate::types::{ProductId, PromoSnapshot};

pub use aggregate::aggregate_quantities;
pub use apply::{AppliedBundle, LinePricing, PriceApplier};
pub use bundle::{resolve_bundles, BundleHit, BundleResolution};
pub use exclusivity::{resolve_exclusivity, Decision};
pub use tiers::pick;

// =============================================================================
// Configuration & Context
// =============================================================================

/// Store-level pricing settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Fractional digits of the store currency (minor units per major).
    pub currency_decimals: u8,
}

impl Default for PricingConfig {
    fn default() -> Self {
        PricingConfig { currency_decimals: 2 }
    }
}

/// Per-request pricing state.
///
/// A request prices its cart at most once; further calls on the same
/// context are no-ops.
#[derive(Debug, Clone, Default)]
pub struct PricingContext {
    priced: bool,
}

impl PricingContext {
    pub fn new() -> Self {
        PricingContext::default()
    }

    pub fn is_priced(&self) -> bool {
        self.priced
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Result of one pricing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct PricingSummary {
    pub lines: Vec<LinePricing>,
    pub bundles: Vec<AppliedBundle>,
    /// Savings from discounted line prices.
    pub line_savings: Money,
    /// Savings from bundle fees (positive).
    pub bundle_savings: Money,
    pub total_savings: Money,
}

impl PricingSummary {
    fn new(lines: Vec<LinePricing>, bundles: Vec<AppliedBundle>) -> Self {
        let line_savings: Money = lines.iter().map(LinePricing::savings).sum();
        let bundle_savings: Money = bundles.iter().map(|b| -b.fee).sum();
        PricingSummary {
            lines,
            bundles,
            line_savings,
            bundle_savings,
            total_savings: line_savings + bundle_savings,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Runs the pricing pipeline against a cart.
#[derive(Debug, Clone, Default)]
pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        PricingEngine { config }
    }

    /// Reprices `cart` from `snapshot`.
    ///
    /// ## Returns
    /// * `Some(summary)` after a pass
    /// * `None` if `ctx` was already priced
    ///
    /// ## Example
    /// ```rust
    /// use promo_core::pricing::{PricingContext, PricingEngine};
    /// use promo_core::types::PromoSnapshot;
    /// # use promo_core::{Cart, CartLine, Money};
    /// # struct Empty;
    /// # impl Cart for Empty {
    /// #     fn lines(&self) -> Vec<CartLine> { vec![] }
    /// #     fn persist_base_price(&mut self, _: &str, _: Money) {}
    /// #     fn set_line_price(&mut self, _: &str, _: Money) {}
    /// #     fn clear_fees(&mut self) {}
    /// #     fn add_fee(&mut self, _: &str, _: Money) {}
    /// # }
    ///
    /// let engine = PricingEngine::default();
    /// let mut ctx = PricingContext::new();
    /// let mut cart = Empty;
    ///
    /// assert!(engine.reprice(&mut ctx, &PromoSnapshot::new(), &mut cart).is_some());
    /// assert!(engine.reprice(&mut ctx, &PromoSnapshot::new(), &mut cart).is_none());
    /// ```
    pub fn reprice<C: Cart + ?Sized>(
        &self,
        ctx: &mut PricingContext,
        snapshot: &PromoSnapshot,
        cart: &mut C,
    ) -> Option<PricingSummary> {
        if ctx.priced {
            debug!("Cart already priced in this request");
            return None;
        }
        ctx.priced = true;

        let lines = cart.lines();
        let quantities = aggregate_quantities(&lines);
        let present: BTreeSet<ProductId> = quantities.keys().copied().collect();

        let bundles = resolve_bundles(snapshot, &present);
        let decisions = resolve_exclusivity(snapshot, &quantities, &bundles);
        let (priced, applied) = PriceApplier.apply(cart, &lines, &decisions, &bundles);

        let summary = PricingSummary::new(priced, applied);
        debug!(
            lines = summary.lines.len(),
            bundles = summary.bundles.len(),
            savings = %summary.total_savings.format(self.config.currency_decimals),
            "Cart repriced"
        );
        Some(summary)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

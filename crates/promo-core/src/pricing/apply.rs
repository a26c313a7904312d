//! # Price Applier
//!
//! Writes the outcome of a pricing pass back to the cart.
//!
//! ```text
//! for each line:
//!   base = line.base_price ?? persist(line.unit_price)      (once per line)
//!   Tier { rate }    → unit_price = base.apply_discount(rate)
//!   Bundle / None    → unit_price = base
//!
//! for each bundle hit:
//!   fee = −Σ base(member).discount_amount(rate)              (one unit each)
//! ```
//!
//! Fees from a previous pass are cleared before anything is written, so
//! repricing an unchanged cart leaves it unchanged.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};
use ts_rs::TS;

use super::bundle::{BundleHit, BundleResolution};
use super::exclusivity::Decision;
use crate::cart::Cart;
use crate::money::Money;
use crate::types::{CartLine, DiscountRate, ProductId};

/// Label prefix for bundle fees.
pub const BUNDLE_FEE_LABEL: &str = "Bundle discount";

/// Final price of one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct LinePricing {
    pub line_id: String,
    pub product_id: ProductId,
    pub quantity: u32,
    pub base_price: Money,
    pub unit_price: Money,
    pub decision: Decision,
}

impl LinePricing {
    /// What the line price saves over the whole quantity.
    pub fn savings(&self) -> Money {
        (self.base_price - self.unit_price) * self.quantity
    }
}

/// A bundle fee written to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct AppliedBundle {
    pub group_key: String,
    pub label: String,
    pub members: Vec<ProductId>,
    pub rate: DiscountRate,
    /// Negative amount.
    pub fee: Money,
}

/// Stateless writer of prices and fees.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceApplier;

impl PriceApplier {
    /// Applies `decisions` to `lines` and adds one fee per bundle hit.
    ///
    /// Lines whose price cannot be trusted (negative base) are left
    /// untouched and logged.
    pub fn apply<C: Cart + ?Sized>(
        &self,
        cart: &mut C,
        lines: &[CartLine],
        decisions: &BTreeMap<ProductId, Decision>,
        bundles: &BundleResolution,
    ) -> (Vec<LinePricing>, Vec<AppliedBundle>) {
        cart.clear_fees();

        let mut priced = Vec::with_capacity(lines.len());
        let mut bases: BTreeMap<ProductId, Money> = BTreeMap::new();

        for line in lines {
            let base = match line.base_price {
                Some(base) => base,
                None => {
                    cart.persist_base_price(&line.line_id, line.unit_price);
                    line.unit_price
                }
            };
            if base.is_negative() {
                warn!(line_id = %line.line_id, base = %base, "Negative base price, leaving line as is");
                continue;
            }

            let decision = decisions
                .get(&line.product_id)
                .cloned()
                .unwrap_or(Decision::None);
            let unit_price = match &decision {
                Decision::Tier { rate, .. } => base.apply_discount(*rate),
                Decision::Bundle { .. } | Decision::None => base,
            };
            cart.set_line_price(&line.line_id, unit_price);

            if line.quantity > 0 {
                bases.entry(line.product_id).or_insert(base);
            }
            priced.push(LinePricing {
                line_id: line.line_id.clone(),
                product_id: line.product_id,
                quantity: line.quantity,
                base_price: base,
                unit_price,
                decision,
            });
        }

        let mut applied = Vec::with_capacity(bundles.hits.len());
        for hit in &bundles.hits {
            let Some(fee) = bundle_fee(hit, &bases) else {
                continue;
            };
            let label = fee_label(hit);
            cart.add_fee(&label, fee);
            debug!(group_key = %hit.group_key, fee = %fee, "Bundle fee added");
            applied.push(AppliedBundle {
                group_key: hit.group_key.clone(),
                label,
                members: hit.members.iter().copied().collect(),
                rate: hit.rate,
                fee,
            });
        }

        (priced, applied)
    }
}

/// One discounted unit per member. `None` when nothing is saved or a
/// member has no usable base price.
fn bundle_fee(hit: &BundleHit, bases: &BTreeMap<ProductId, Money>) -> Option<Money> {
    let mut saving = Money::zero();
    for member in &hit.members {
        let Some(base) = bases.get(member) else {
            warn!(group_key = %hit.group_key, product_id = member, "Bundle member has no base price, skipping fee");
            return None;
        };
        saving += base.discount_amount(hit.rate);
    }
    (!saving.is_zero()).then(|| -saving)
}

fn fee_label(hit: &BundleHit) -> String {
    if hit.name.trim().is_empty() {
        BUNDLE_FEE_LABEL.to_string()
    } else {
        format!("{BUNDLE_FEE_LABEL}: {}", hit.name.trim())
    }
}

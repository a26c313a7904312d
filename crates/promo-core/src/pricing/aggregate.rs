//! Per-product quantity totals.

use std::collections::BTreeMap;

use crate::types::{CartLine, ProductId};

/// Sums line quantities per parent product. Variation lines roll up to
/// their parent; zero-quantity lines contribute nothing and do not make a
/// product "present".
pub fn aggregate_quantities(lines: &[CartLine]) -> BTreeMap<ProductId, u32> {
    let mut totals: BTreeMap<ProductId, u32> = BTreeMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        let total = totals.entry(line.product_id).or_insert(0);
        *total = total.saturating_add(line.quantity);
    }
    totals
}

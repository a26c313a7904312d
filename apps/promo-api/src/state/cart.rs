//! # Cart State
//!
//! A single in-memory reference cart that the pricing engine writes into.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  HTTP request              Handler                Cart change           │
//! │  ────────────              ───────                ───────────           │
//! │                                                                         │
//! │  POST /cart/items ───────► add_item() ──────────► push or merge line    │
//! │  POST /cart/bundles ─────► add_bundle() ────────► anchor + members      │
//! │  PATCH /cart/items/{id} ─► update_item() ───────► lines[i].qty = n      │
//! │  DELETE /cart/items/{id} ► remove_item() ───────► lines.remove(i)       │
//! │  DELETE /cart ───────────► clear_cart() ────────► lines.clear()         │
//! │                                                                         │
//! │  Every mutation is followed by PricingEngine::reprice, which writes     │
//! │  line prices and bundle fees back through the `Cart` trait.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is a `tokio::sync::Mutex`: a mutation holds it while the promo
//! snapshot loads, so two requests never price interleaved states.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use promo_core::{Cart, CartLine, Money, PricingSummary, ProductId, MAX_CART_LINES, MAX_ITEM_QUANTITY};

/// Cart operation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Cart line not found: {0}")]
    LineNotFound(String),

    #[error("Quantity would exceed maximum of {max}")]
    QuantityTooLarge { max: u32 },

    #[error("Cart cannot have more than {max} lines")]
    TooManyLines { max: usize },
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub line_id: String,
    pub product_id: ProductId,
    pub variation_id: Option<ProductId>,
    /// Title at time of adding (frozen)
    pub title: String,
    pub quantity: u32,
    /// Current unit price, written by pricing
    pub unit_price: Money,
    /// Undiscounted unit price, recorded by the first pricing pass
    pub base_price: Option<Money>,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity as i64)
    }
}

/// A cart-level fee. Bundle discounts are negative fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartFee {
    pub label: String,
    pub amount: Money,
}

/// The reference cart.
#[derive(Debug, Clone)]
pub struct InMemoryCart {
    items: Vec<CartItem>,
    fees: Vec<CartFee>,
    pricing: Option<PricingSummary>,
    created_at: DateTime<Utc>,
}

impl Default for InMemoryCart {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCart {
    pub fn new() -> Self {
        InMemoryCart {
            items: Vec::new(),
            fees: Vec::new(),
            pricing: None,
            created_at: Utc::now(),
        }
    }

    /// Adds a product, or increases the quantity of the line already
    /// holding the same product and variation.
    ///
    /// ## Returns
    /// The id of the line that changed.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        variation_id: Option<ProductId>,
        title: &str,
        price: Money,
        quantity: u32,
    ) -> Result<String, CartError> {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == product_id && i.variation_id == variation_id)
        {
            let new_qty = item.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CartError::QuantityTooLarge { max: MAX_ITEM_QUANTITY });
            }
            item.quantity = new_qty;
            return Ok(item.line_id.clone());
        }

        if self.items.len() >= MAX_CART_LINES {
            return Err(CartError::TooManyLines { max: MAX_CART_LINES });
        }

        let line_id = Uuid::new_v4().to_string();
        self.items.push(CartItem {
            line_id: line_id.clone(),
            product_id,
            variation_id,
            title: title.to_string(),
            quantity,
            unit_price: price,
            base_price: None,
            added_at: Utc::now(),
        });
        Ok(line_id)
    }

    /// Sets the quantity of a line. Zero removes it.
    pub fn update_quantity(&mut self, line_id: &str, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(line_id);
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CartError::QuantityTooLarge { max: MAX_ITEM_QUANTITY });
        }

        let item = self
            .items
            .iter_mut()
            .find(|i| i.line_id == line_id)
            .ok_or_else(|| CartError::LineNotFound(line_id.to_string()))?;
        item.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, line_id: &str) -> Result<(), CartError> {
        let initial_len = self.items.len();
        self.items.retain(|i| i.line_id != line_id);

        if self.items.len() == initial_len {
            Err(CartError::LineNotFound(line_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.fees.clear();
        self.pricing = None;
        self.created_at = Utc::now();
    }

    /// Distinct parent product ids in the cart.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.items.iter().map(|i| i.product_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn fees(&self) -> &[CartFee] {
        &self.fees
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Records the outcome of the latest pricing pass.
    pub fn set_pricing(&mut self, pricing: Option<PricingSummary>) {
        self.pricing = pricing;
    }

    pub fn view(&self) -> CartView {
        let subtotal: Money = self.items.iter().map(CartItem::line_total).sum();
        let fee_total: Money = self.fees.iter().map(|f| f.amount).sum();
        CartView {
            lines: self.items.clone(),
            fees: self.fees.clone(),
            subtotal,
            fee_total,
            total: subtotal + fee_total,
            pricing: self.pricing.clone(),
            created_at: self.created_at,
        }
    }
}

impl Cart for InMemoryCart {
    fn lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .map(|i| CartLine {
                line_id: i.line_id.clone(),
                product_id: i.product_id,
                variation_id: i.variation_id,
                quantity: i.quantity,
                unit_price: i.unit_price,
                base_price: i.base_price,
            })
            .collect()
    }

    fn persist_base_price(&mut self, line_id: &str, base: Money) {
        if let Some(item) = self.items.iter_mut().find(|i| i.line_id == line_id) {
            item.base_price.get_or_insert(base);
        }
    }

    fn set_line_price(&mut self, line_id: &str, price: Money) {
        if let Some(item) = self.items.iter_mut().find(|i| i.line_id == line_id) {
            item.unit_price = price;
        }
    }

    fn clear_fees(&mut self) {
        self.fees.clear();
    }

    fn add_fee(&mut self, label: &str, amount: Money) {
        self.fees.push(CartFee {
            label: label.to_string(),
            amount,
        });
    }
}

/// Cart as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartItem>,
    pub fees: Vec<CartFee>,
    pub subtotal: Money,
    pub fee_total: Money,
    pub total: Money,
    /// Decisions of the latest pricing pass
    pub pricing: Option<PricingSummary>,
    pub created_at: DateTime<Utc>,
}

/// Shared cart state.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    cart: Arc<Mutex<InMemoryCart>>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclusive access to the cart.
    pub async fn lock(&self) -> MutexGuard<'_, InMemoryCart> {
        self.cart.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_with_desk() -> (InMemoryCart, String) {
        let mut cart = InMemoryCart::new();
        let line = cart
            .add_item(10, None, "Desk", Money::from_minor(10_000), 1)
            .unwrap();
        (cart, line)
    }

    #[test]
    fn test_add_merges_same_product_and_variation() {
        let (mut cart, line) = cart_with_desk();
        let again = cart.add_item(10, None, "Desk", Money::from_minor(10_000), 2).unwrap();
        assert_eq!(line, again);
        assert_eq!(cart.items()[0].quantity, 3);

        cart.add_item(10, Some(101), "Desk (oak)", Money::from_minor(10_000), 1).unwrap();
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.product_ids(), vec![10]);
    }

    #[test]
    fn test_quantity_limits() {
        let (mut cart, line) = cart_with_desk();
        assert_eq!(
            cart.update_quantity(&line, MAX_ITEM_QUANTITY + 1),
            Err(CartError::QuantityTooLarge { max: MAX_ITEM_QUANTITY })
        );
        assert!(cart.update_quantity(&line, 0).is_ok());
        assert!(cart.is_empty());
        assert_eq!(
            cart.remove_item(&line),
            Err(CartError::LineNotFound(line.clone()))
        );
    }

    #[test]
    fn test_base_price_is_written_once() {
        let (mut cart, line) = cart_with_desk();
        cart.persist_base_price(&line, Money::from_minor(10_000));
        cart.persist_base_price(&line, Money::from_minor(1));
        cart.set_line_price(&line, Money::from_minor(9_000));

        let lines = cart.lines();
        assert_eq!(lines[0].base_price, Some(Money::from_minor(10_000)));
        assert_eq!(lines[0].unit_price, Money::from_minor(9_000));
    }

    #[test]
    fn test_view_totals_include_fees() {
        let (mut cart, line) = cart_with_desk();
        cart.update_quantity(&line, 2).unwrap();
        cart.add_fee("Bundle discount", Money::from_minor(-1_500));

        let view = cart.view();
        assert_eq!(view.subtotal, Money::from_minor(20_000));
        assert_eq!(view.fee_total, Money::from_minor(-1_500));
        assert_eq!(view.total, Money::from_minor(18_500));

        cart.clear_fees();
        assert!(cart.fees().is_empty());
    }
}

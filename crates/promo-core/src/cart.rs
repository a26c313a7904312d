//! # Cart Collaborator
//!
//! The host cart owns lines, quantities and fees. The pricing engine only
//! reads lines and writes prices/fees back through this trait.
//!
//! ```text
//! PricingEngine ──lines()──────────────► Cart
//!               ──persist_base_price()─►   (once per line)
//!               ──set_line_price()─────►   (every pass)
//!               ──clear_fees()/add_fee()►  (every pass)
//! ```

use crate::money::Money;
use crate::types::CartLine;

/// Write-back surface of a host cart.
///
/// Implementations are synchronous: a pricing pass never awaits.
pub trait Cart {
    /// Snapshot of the current lines.
    fn lines(&self) -> Vec<CartLine>;

    /// Records the undiscounted unit price for a line. Called only when the
    /// line has none yet.
    fn persist_base_price(&mut self, line_id: &str, base: Money);

    /// Sets the unit price of a line.
    fn set_line_price(&mut self, line_id: &str, price: Money);

    /// Drops every fee added by a previous pass.
    fn clear_fees(&mut self);

    /// Adds a fee; discounts are negative amounts.
    fn add_fee(&mut self, label: &str, amount: Money);
}

//! # promo-core: Pure Pricing Logic for the Promo Engine
//!
//! Rule types, rule validation and the cart pricing pipeline, as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Promo Engine Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    promo-api (axum)                             │   │
//! │  │     /rules CRUD        /cart mutations        /health          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ promo-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │ validation│  │  dedupe   │  │   │
//! │  │   │ TierRule  │  │ aggregate │  │   tiers   │  │ Duplicate │  │   │
//! │  │   │ Bundle*   │  │ bundle    │  │  groups   │  │ Suppressor│  │   │
//! │  │   │ CartLine  │  │ apply     │  │  paging   │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  promo-db (Database Layer)                      │   │
//! │  │        Rule store, metadata projection, catalog, migrations     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Rule and cart types (TierRule, BundleGroup, CartLine, ...)
//! - [`money`] - Money type with integer arithmetic and discount rounding
//! - [`error`] - Domain error types
//! - [`validation`] - Rule normalization and validation
//! - [`hashing`] - Group keys
//! - [`cart`] - The cart collaborator trait
//! - [`pricing`] - Aggregation, tier/bundle selection, exclusivity, price application
//! - [`dedupe`] - Short-window suppression of repeated bundle-add actions
//!
//! ## Example Usage
//!
//! ```rust
//! use promo_core::money::Money;
//! use promo_core::types::DiscountRate;
//!
//! let base = Money::from_minor(10_000); // 100.00
//! let rate = DiscountRate::from_bps(500); // 5%
//!
//! assert_eq!(base.apply_discount(rate).minor(), 9_500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod dedupe;
pub mod error;
pub mod hashing;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::Cart;
pub use dedupe::{DedupeKey, DuplicateSuppressor};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{PricingConfig, PricingContext, PricingEngine, PricingSummary};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Hard ceiling for any discount rate, as a fraction of the base price.
pub const MAX_DISCOUNT_FRACTION: f64 = 0.95;

/// Smallest quantity (tiers) or distinct-item count (bundles) a threshold may use.
pub const MIN_THRESHOLD: u32 = 2;

/// Largest threshold accepted for a tier or bundle rate tier.
pub const MAX_THRESHOLD: u32 = 10_000;

/// Default page size for rule listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound for `per_page` on rule listings.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Maximum quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: u32 = 999;

/// Maximum number of lines in the reference cart.
pub const MAX_CART_LINES: usize = 100;

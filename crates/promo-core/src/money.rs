//! # Money Module
//!
//! Provides the `Money` type for handling prices, fees and savings.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    100.00 × (1 − 0.07) = 92.99999999999999  ❌                          │
//! │                                                                         │
//! │  Recomputing that on every cart mutation drifts the line price.        │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    10000 × (10000 − 700) / 10000 = 9300  (exact, repeatable)           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The minor unit is whatever the configured currency precision says it is:
//! with `currency_decimals = 2`, `Money::from_minor(1099)` is 10.99.
//!
//! ## Usage
//! ```rust
//! use promo_core::money::Money;
//! use promo_core::types::DiscountRate;
//!
//! let base = Money::from_minor(1999);
//! let discounted = base.apply_discount(DiscountRate::from_bps(1000)); // 10% off
//! assert_eq!(discounted.minor(), 1799); // 17.991 rounds to 17.99
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::types::DiscountRate;

/// Basis points in one whole (100%).
const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Where Money Flows
/// ```text
/// ProductCatalog.base_price ──► CartLine.base_price (persisted once)
///                                    │
///                                    ▼
///                     apply_discount(rate) ──► CartLine.unit_price
///                                    │
///                                    └──► bundle fee (negative Money)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the price left after taking `rate` off, rounded to the
    /// nearest minor unit (halves round away from zero).
    ///
    /// ## Implementation
    /// Integer math on i128: `(amount × (10000 − bps) ± 5000) / 10000`.
    /// The same base and rate always yield the same result, which is what
    /// makes repeated repricing idempotent.
    ///
    /// ## Example
    /// ```rust
    /// use promo_core::money::Money;
    /// use promo_core::types::DiscountRate;
    ///
    /// let base = Money::from_minor(10_000); // 100.00
    /// let price = base.apply_discount(DiscountRate::from_bps(500));
    /// assert_eq!(price.minor(), 9_500); // 95.00
    /// ```
    pub fn apply_discount(&self, rate: DiscountRate) -> Money {
        let keep_bps = BPS_SCALE - rate.bps().min(10_000) as i128;
        let scaled = self.0 as i128 * keep_bps;
        Money(round_div(scaled, BPS_SCALE) as i64)
    }

    /// Returns how much `apply_discount(rate)` takes off one unit.
    #[inline]
    pub fn discount_amount(&self, rate: DiscountRate) -> Money {
        *self - self.apply_discount(rate)
    }

    /// Renders the value with `decimals` fractional digits.
    ///
    /// ## Example
    /// ```rust
    /// use promo_core::money::Money;
    ///
    /// assert_eq!(Money::from_minor(-550).format(2), "-5.50");
    /// assert_eq!(Money::from_minor(1500).format(0), "1500");
    /// ```
    pub fn format(&self, decimals: u8) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        if decimals == 0 {
            return format!("{sign}{abs}");
        }
        let scale = 10u64.pow(decimals as u32);
        format!(
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = decimals as usize
        )
    }
}

/// Integer division rounding halves away from zero.
fn round_div(numerator: i128, denominator: i128) -> i128 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-oriented display with two decimals. Callers that know the
/// configured precision use [`Money::format`].
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(2))
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a cart quantity.
impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        Money(self.0 * qty as i64)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor() {
        let money = Money::from_minor(1099);
        assert_eq!(money.minor(), 1099);
        assert!(money.is_positive());
    }

    #[test]
    fn test_format() {
        assert_eq!(Money::from_minor(1099).format(2), "10.99");
        assert_eq!(Money::from_minor(500).format(2), "5.00");
        assert_eq!(Money::from_minor(-550).format(2), "-5.50");
        assert_eq!(Money::from_minor(0).format(2), "0.00");
        assert_eq!(Money::from_minor(12345).format(3), "12.345");
        assert_eq!(Money::from_minor(950).format(0), "950");
        assert_eq!(format!("{}", Money::from_minor(9500)), "95.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((-b).minor(), -500);
        assert_eq!((a * 3u32).minor(), 3000);

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.minor(), 2000);
    }

    #[test]
    fn test_apply_discount_exact() {
        let base = Money::from_minor(10_000);
        assert_eq!(base.apply_discount(DiscountRate::from_bps(500)).minor(), 9_500);
        assert_eq!(base.apply_discount(DiscountRate::from_bps(1000)).minor(), 9_000);
        assert_eq!(base.apply_discount(DiscountRate::zero()).minor(), 10_000);
    }

    #[test]
    fn test_apply_discount_rounds_half_away_from_zero() {
        // 9.99 × 0.95 = 9.4905 → 9.49
        assert_eq!(
            Money::from_minor(999).apply_discount(DiscountRate::from_bps(500)).minor(),
            949
        );
        // 0.10 × 0.95 = 0.095 → 0.10 (half rounds up)
        assert_eq!(
            Money::from_minor(10).apply_discount(DiscountRate::from_bps(500)).minor(),
            10
        );
        // 0.30 × 0.95 = 0.285 → 0.29
        assert_eq!(
            Money::from_minor(30).apply_discount(DiscountRate::from_bps(500)).minor(),
            29
        );
    }

    #[test]
    fn test_apply_discount_is_repeatable() {
        let base = Money::from_minor(1999);
        let rate = DiscountRate::from_bps(700);
        let first = base.apply_discount(rate);
        let second = base.apply_discount(rate);
        assert_eq!(first, second);
    }

    #[test]
    fn test_discount_amount() {
        let base = Money::from_minor(10_000);
        let saved = base.discount_amount(DiscountRate::from_bps(1000));
        assert_eq!(saved.minor(), 1_000);
    }
}

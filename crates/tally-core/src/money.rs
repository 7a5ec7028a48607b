//! # Money Module
//!
//! Provides the `Money` type used for every amount the sale engine touches.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Totals must satisfy grand = sub + tax − discount EXACTLY.             │
//! │                                                                         │
//! │  With floats:  20.00 + 2.00 − 0.10 = 21.900000000000002                 │
//! │  With cents:   2000 + 200 − 10     = 2190                               │
//! │                                                                         │
//! │  Every split-tender sum, change calculation and refund proration is    │
//! │  done on i64 cents, so invariants hold bit-for-bit.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(1000); // 10.00
//! let line = price.multiply_quantity(2);
//! assert_eq!(line.cents(), 2000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::TaxRate;

/// Number of cents in one whole currency unit.
pub const CENTS_PER_UNIT: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed so that refunds and compensation deltas can be expressed
/// without a second type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_units(22).cents(), 2200);
    /// ```
    #[inline]
    pub const fn from_units(units: i64) -> Self {
        Money(units * CENTS_PER_UNIT)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns `self` or zero, whichever is larger.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Calculates tax at the given rate, rounding half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, widened to i128 so
    /// large line totals cannot overflow.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    /// use tally_core::types::TaxRate;
    ///
    /// // 20.00 at 10% = 2.00
    /// let tax = Money::from_cents(2000).calculate_tax(TaxRate::from_bps(1000));
    /// assert_eq!(tax.cents(), 200);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.percentage(rate.bps() as i64)
    }

    /// Returns `bps` basis points of this amount, rounded half-up.
    ///
    /// Used for percentage promotions: 1500 bps of 40.00 is 6.00.
    pub fn percentage(&self, bps: i64) -> Money {
        let cents = (self.0 as i128 * bps as i128 + 5000) / 10000;
        Money(cents as i64)
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Whole currency units, rounded up.
    ///
    /// Loyalty points are redeemed one point per started currency unit,
    /// so 20.01 costs 21 points.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(2001).ceil_units(), 21);
    /// assert_eq!(Money::from_cents(2000).ceil_units(), 20);
    /// ```
    pub const fn ceil_units(&self) -> i64 {
        if self.0 <= 0 {
            return 0;
        }
        (self.0 + CENTS_PER_UNIT - 1) / CENTS_PER_UNIT
    }

    /// Number of whole `step`s contained in this amount (floor).
    ///
    /// Negative amounts and non-positive steps yield zero.
    pub const fn whole_steps(&self, step: Money) -> i64 {
        if self.0 <= 0 || step.0 <= 0 {
            return 0;
        }
        self.0 / step.0
    }

    /// `None` when the sum leaves the `i64` range.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn saturating_add(&self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Scales this amount by `numerator / denominator`, rounding half-up.
    ///
    /// Used to prorate a sold line when only part of it is returned.
    pub fn prorate(&self, numerator: i64, denominator: i64) -> Money {
        if denominator == 0 {
            return Money::zero();
        }
        let scaled = (self.0 as i128 * numerator as i128 * 2 + denominator as i128)
            / (denominator as i128 * 2);
        Money(scaled as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Debug-friendly rendering; UI formatting lives in the front end.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        write!(f, "{}{}.{:02}", sign, abs / CENTS_PER_UNIT, abs % CENTS_PER_UNIT)
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
    fn test_display() {
        assert_eq!(Money::from_cents(2200).to_string(), "22.00");
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 10.00 at 8.25% = 0.825 → 0.83
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(Money::from_cents(4000).percentage(1500).cents(), 600);
        assert_eq!(Money::from_cents(999).percentage(0).cents(), 0);
    }

    #[test]
    fn test_ceil_units() {
        assert_eq!(Money::from_cents(1).ceil_units(), 1);
        assert_eq!(Money::from_cents(0).ceil_units(), 0);
        assert_eq!(Money::from_cents(-300).ceil_units(), 0);
    }

    #[test]
    fn test_whole_steps() {
        let ten = Money::from_units(10);
        assert_eq!(Money::from_cents(2200).whole_steps(ten), 2);
        assert_eq!(Money::from_cents(999).whole_steps(ten), 0);
        assert_eq!(Money::from_cents(5000).whole_steps(Money::zero()), 0);
    }

    #[test]
    fn test_prorate() {
        // 2 of 3 units of a 10.00 line
        assert_eq!(Money::from_cents(1000).prorate(2, 3).cents(), 667);
        assert_eq!(Money::from_cents(2200).prorate(1, 2).cents(), 1100);
        assert_eq!(Money::from_cents(2200).prorate(1, 0).cents(), 0);
    }

    #[test]
    fn test_sum_and_non_negative() {
        let total: Money = [100, 250, -50].iter().map(|c| Money::from_cents(*c)).sum();
        assert_eq!(total.cents(), 300);
        assert_eq!(Money::from_cents(-1).non_negative(), Money::zero());
    }

    #[test]
    fn test_checked_arithmetic() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max.checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(100).checked_add(Money::from_cents(1)),
            Some(Money::from_cents(101))
        );
        assert_eq!(max.checked_multiply_quantity(2), None);
        assert_eq!(max.saturating_add(Money::from_cents(1)), max);
    }
}

//! Loyalty point arithmetic.
//!
//! Points are earned per whole earn unit of the grand total (default 10.00)
//! and redeemed one per started currency unit of a loyalty tender.

use crate::money::Money;

/// Points earned by a sale: floor(grand_total / earn_unit).
///
/// ```rust
/// use tally_core::loyalty::points_earned;
/// use tally_core::money::Money;
///
/// assert_eq!(points_earned(Money::from_cents(2200), Money::from_cents(1000)), 2);
/// assert_eq!(points_earned(Money::from_cents(999), Money::from_cents(1000)), 0);
/// ```
pub fn points_earned(grand_total: Money, earn_unit: Money) -> i64 {
    grand_total.whole_steps(earn_unit)
}

/// Points a loyalty tender of `amount` consumes.
pub fn points_for_amount(amount: Money) -> i64 {
    amount.ceil_units()
}

/// Net balance change for a sale.
pub fn points_delta(earned: i64, redeemed: i64) -> i64 {
    earned - redeemed
}

/// Balance after applying `delta`, or `None` if it would go negative.
pub fn apply_delta(balance: i64, delta: i64) -> Option<i64> {
    balance.checked_add(delta).filter(|next| *next >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redeem_and_earn() {
        let unit = Money::from_cents(1000);
        let total = Money::from_cents(4550);

        let earned = points_earned(total, unit);
        let redeemed = points_for_amount(total);
        assert_eq!(earned, 4);
        assert_eq!(redeemed, 46);
        assert_eq!(points_delta(earned, redeemed), -42);
    }

    #[test]
    fn test_apply_delta_never_negative() {
        assert_eq!(apply_delta(50, -42), Some(8));
        assert_eq!(apply_delta(41, -42), None);
        assert_eq!(apply_delta(0, 2), Some(2));
    }
}

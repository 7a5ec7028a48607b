//! # Promotion Evaluator
//!
//! Prices an optional promo code and enforces the manager-override gate on
//! large discounts.
//!
//! ```text
//! promo_code? ──► exists? active? in window? sub_total ≥ minimum?
//!                      │
//!                      ▼
//!              percentage: sub_total × value_bps / 10000
//!              fixed:      value
//!                      │
//!                      ▼
//!              clamp to sub_total
//!
//! (Σ line discounts + manual discount) / sub_total > threshold
//!      && no approval_code / manager_id ──► DiscountLimitExceeded
//! ```

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Promotion, PromotionKind};

/// Validates `promotion` for `code` at `now` and returns its discount.
///
/// `promotion` is the catalog lookup result for `code`; `None` means the
/// code does not exist.
pub fn evaluate_promotion(
    code: &str,
    promotion: Option<&Promotion>,
    sub_total: Money,
    now: DateTime<Utc>,
) -> CoreResult<Money> {
    let promo = promotion.ok_or_else(|| CoreError::invalid_promotion(code, "unknown code"))?;

    if !promo.is_active {
        return Err(CoreError::invalid_promotion(code, "promotion is inactive"));
    }
    if now < promo.start_date {
        return Err(CoreError::invalid_promotion(code, "promotion has not started"));
    }
    if now > promo.end_date {
        return Err(CoreError::invalid_promotion(code, "promotion has ended"));
    }
    if sub_total.cents() < promo.min_order_value_cents {
        return Err(CoreError::invalid_promotion(
            code,
            format!(
                "order of {} is below the minimum of {}",
                sub_total,
                Money::from_cents(promo.min_order_value_cents)
            ),
        ));
    }

    let discount = match promo.kind {
        PromotionKind::Percentage => sub_total.percentage(promo.value),
        PromotionKind::Fixed => Money::from_cents(promo.value),
    };

    Ok(discount.non_negative().min(sub_total))
}

/// Who, if anyone, authorised a discount above the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountApproval<'a> {
    pub approval_code: Option<&'a str>,
    pub manager_id: Option<&'a str>,
}

impl DiscountApproval<'_> {
    /// True when either an approval code or a manager id was supplied.
    pub fn is_granted(&self) -> bool {
        let present = |v: Option<&str>| v.map(|s| !s.trim().is_empty()).unwrap_or(false);
        present(self.approval_code) || present(self.manager_id)
    }
}

/// Combined discount as basis points of the sub total, rounded down.
///
/// A positive discount on a zero sub total counts as unbounded.
pub fn combined_discount_bps(line_discounts: Money, manual_discount: Money, sub_total: Money) -> i64 {
    let combined = line_discounts.saturating_add(manual_discount).cents();
    if combined <= 0 {
        return 0;
    }
    if sub_total.cents() <= 0 {
        return i64::MAX;
    }
    ((combined as i128 * 10000) / sub_total.cents() as i128).min(i64::MAX as i128) as i64
}

/// Rejects a combined discount above `threshold_bps` unless approved.
///
/// The threshold itself is allowed: exactly 10% passes a 10% gate.
pub fn check_discount_gate(
    line_discounts: Money,
    manual_discount: Money,
    sub_total: Money,
    threshold_bps: i64,
    approval: DiscountApproval<'_>,
) -> CoreResult<()> {
    let combined = line_discounts.cents() as i128 + manual_discount.cents() as i128;
    let exceeds = combined * 10000 > threshold_bps as i128 * sub_total.cents().max(0) as i128;

    if exceeds && !approval.is_granted() {
        return Err(CoreError::DiscountLimitExceeded {
            discount_bps: combined_discount_bps(line_discounts, manual_discount, sub_total),
            limit_bps: threshold_bps,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const NO_APPROVAL: DiscountApproval<'static> = DiscountApproval {
        approval_code: None,
        manager_id: None,
    };

    fn promo(kind: PromotionKind, value: i64) -> Promotion {
        let now = Utc::now();
        Promotion {
            code: "SPRING".to_string(),
            kind,
            value,
            min_order_value_cents: 1000,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_and_fixed() {
        let now = Utc::now();
        let sub = Money::from_cents(4000);

        let pct = promo(PromotionKind::Percentage, 1500);
        assert_eq!(evaluate_promotion("SPRING", Some(&pct), sub, now).unwrap().cents(), 600);

        let fixed = promo(PromotionKind::Fixed, 500);
        assert_eq!(evaluate_promotion("SPRING", Some(&fixed), sub, now).unwrap().cents(), 500);
    }

    #[test]
    fn test_fixed_discount_is_clamped_to_sub_total() {
        let fixed = promo(PromotionKind::Fixed, 10_000);
        let sub = Money::from_cents(2500);
        let discount = evaluate_promotion("SPRING", Some(&fixed), sub, Utc::now()).unwrap();
        assert_eq!(discount, sub);
    }

    #[test]
    fn test_rejections() {
        let now = Utc::now();
        let sub = Money::from_cents(4000);

        assert!(evaluate_promotion("NOPE", None, sub, now).is_err());

        let mut inactive = promo(PromotionKind::Fixed, 100);
        inactive.is_active = false;
        assert!(evaluate_promotion("SPRING", Some(&inactive), sub, now).is_err());

        let valid = promo(PromotionKind::Fixed, 100);
        let later = now + Duration::days(3);
        assert!(evaluate_promotion("SPRING", Some(&valid), sub, later).is_err());

        let small = Money::from_cents(999);
        let err = evaluate_promotion("SPRING", Some(&valid), small, now).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPromotion { .. }));
    }

    #[test]
    fn test_discount_gate() {
        let sub = Money::from_cents(10_000);
        let fifteen = Money::from_cents(1500);

        let err = check_discount_gate(fifteen, Money::zero(), sub, 1000, NO_APPROVAL).unwrap_err();
        assert_eq!(
            err,
            CoreError::DiscountLimitExceeded {
                discount_bps: 1500,
                limit_bps: 1000
            }
        );

        let approved = DiscountApproval {
            approval_code: Some("MGR-42"),
            manager_id: None,
        };
        assert!(check_discount_gate(fifteen, Money::zero(), sub, 1000, approved).is_ok());

        // manual discount counts towards the gate
        let five = Money::from_cents(500);
        assert!(check_discount_gate(five, Money::from_cents(600), sub, 1000, NO_APPROVAL).is_err());

        // exactly at threshold passes
        assert!(check_discount_gate(Money::from_cents(1000), Money::zero(), sub, 1000, NO_APPROVAL).is_ok());
    }

    #[test]
    fn test_gate_with_extreme_discounts() {
        let sub = Money::from_cents(10_000);
        let err = check_discount_gate(
            Money::from_cents(1),
            Money::from_cents(i64::MAX),
            sub,
            1000,
            NO_APPROVAL,
        )
        .unwrap_err();
        assert_eq!(
            err,
            CoreError::DiscountLimitExceeded {
                discount_bps: i64::MAX,
                limit_bps: 1000
            }
        );
    }

    #[test]
    fn test_blank_approval_is_not_approval() {
        let blank = DiscountApproval {
            approval_code: Some("  "),
            manager_id: None,
        };
        assert!(!blank.is_granted());
    }
}

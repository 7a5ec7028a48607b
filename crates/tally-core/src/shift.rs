//! # Shift Reconciliation
//!
//! Cash drawer arithmetic for closing a shift.
//!
//! ```text
//! cash_sales  = Σ (cash payments − change given)   completed sales only
//! expected    = starting_cash + cash_sales
//! difference  = counted − expected                  negative = drawer short
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{SalePayment, TenderMethod};

/// Figures written onto a shift when it closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftReconciliation {
    pub cash_sales: Money,
    pub expected_cash: Money,
    pub counted_cash: Money,
    pub difference: Money,
}

/// Cash a single sale left in the drawer.
pub fn cash_retained(payments: &[SalePayment], change_given: Money) -> Money {
    let cash: Money = payments
        .iter()
        .filter(|p| p.method == TenderMethod::Cash)
        .map(|p| Money::from_cents(p.amount_cents))
        .sum();
    cash - change_given
}

/// Reconciles a drawer count against the shift's cash sales.
pub fn reconcile(starting_cash: Money, cash_sales: Money, counted_cash: Money) -> ShiftReconciliation {
    let expected_cash = starting_cash + cash_sales;
    ShiftReconciliation {
        cash_sales,
        expected_cash,
        counted_cash,
        difference: counted_cash - expected_cash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payment(method: TenderMethod, amount_cents: i64) -> SalePayment {
        SalePayment {
            id: format!("pay-{}", amount_cents),
            sale_id: "S1".to_string(),
            method,
            amount_cents,
            reference_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cash_retained_ignores_card() {
        let payments = [payment(TenderMethod::Cash, 3000), payment(TenderMethod::Card, 1500)];
        assert_eq!(cash_retained(&payments, Money::from_cents(500)).cents(), 2500);
    }

    #[test]
    fn test_reconcile_short_drawer() {
        let r = reconcile(Money::from_cents(10_000), Money::from_cents(2200), Money::from_cents(12_000));
        assert_eq!(r.expected_cash.cents(), 12_200);
        assert_eq!(r.difference.cents(), -200);
    }
}

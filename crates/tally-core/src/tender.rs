//! # Payment Normalizer
//!
//! Collapses the two tender shapes a terminal may send into one
//! [`NormalizedTender`], then settles it against the grand total.
//!
//! ```text
//! single { payment_method, amount_paid }        payments[] (splits)
//!            │                                          │
//!            │                       each amount > 0, method ∈ {cash, card, bank_transfer}
//!            │                                          │
//!            ▼                                          ▼
//!   one SalePayment row                   ≥ 2 distinct methods ──► split
//!   (loyalty: no row, points)             amount_paid = Σ splits
//!            │                                          │
//!            └───────────────────┬──────────────────────┘
//!                                ▼
//!                       NormalizedTender
//!                                │
//!                 settle(grand_total, status) ──► change_given
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{Customer, PaymentMethod, SaleStatus, TenderMethod};
use crate::validation::{validate_amount_paid, validate_payment_amount};
use crate::MAX_AMOUNT_CENTS;

/// One tender line from `payments[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenderSplit {
    pub method: TenderMethod,
    pub amount_cents: i64,
    #[serde(default)]
    pub reference_id: Option<String>,
}

impl TenderSplit {
    pub fn new(method: TenderMethod, amount_cents: i64) -> Self {
        TenderSplit {
            method,
            amount_cents,
            reference_id: None,
        }
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

/// The tender after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTender {
    pub payment_method: PaymentMethod,
    pub amount_paid: Money,
    /// Rows to persist as `SalePayment`. Empty for a loyalty tender.
    pub payments: Vec<TenderSplit>,
    /// Points consumed by a loyalty tender, zero otherwise.
    pub points_redeemed: i64,
}

impl NormalizedTender {
    /// True when any cash changed hands.
    pub fn has_cash(&self) -> bool {
        self.payments.iter().any(|p| p.method == TenderMethod::Cash)
    }

    pub fn is_loyalty(&self) -> bool {
        self.payment_method == PaymentMethod::Loyalty
    }

    /// Computes change for `grand_total`.
    ///
    /// ## Rules
    /// - `completed`: amount paid must cover the grand total
    /// - `draft`: no sufficiency check; change never goes below zero
    /// - change above zero only when cash was tendered
    pub fn settle(&self, grand_total: Money, status: SaleStatus) -> CoreResult<Money> {
        if status == SaleStatus::Completed && self.amount_paid < grand_total {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("paid {} does not cover total {}", self.amount_paid, grand_total),
            });
        }

        let change = (self.amount_paid - grand_total).non_negative();
        if change.is_positive() && !self.has_cash() {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("change of {} requires a cash tender", change),
            });
        }
        Ok(change)
    }
}

/// Normalizes the declared tender.
///
/// `payments` wins over the single form when non-empty.
///
/// ## Errors
/// - `InvalidPaymentAmount` for a non-positive split
/// - `Validation` for a negative amount, `split` with no splits, or a
///   loyalty tender mixed with splits
pub fn normalize_tender(
    payment_method: PaymentMethod,
    amount_paid_cents: i64,
    payments: &[TenderSplit],
) -> CoreResult<NormalizedTender> {
    if !payments.is_empty() {
        return normalize_splits(payment_method, payments);
    }

    validate_amount_paid(amount_paid_cents)?;
    let amount_paid = Money::from_cents(amount_paid_cents);

    match payment_method {
        PaymentMethod::Split => Err(ValidationError::Required {
            field: "payments".to_string(),
        }
        .into()),
        PaymentMethod::Loyalty => Ok(NormalizedTender {
            payment_method,
            amount_paid,
            payments: Vec::new(),
            points_redeemed: amount_paid.ceil_units(),
        }),
        PaymentMethod::Cash | PaymentMethod::Card | PaymentMethod::BankTransfer => {
            let rows = match payment_method.tender() {
                Some(method) if amount_paid.is_positive() => {
                    vec![TenderSplit::new(method, amount_paid_cents)]
                }
                _ => Vec::new(),
            };
            Ok(NormalizedTender {
                payment_method,
                amount_paid,
                payments: rows,
                points_redeemed: 0,
            })
        }
    }
}

fn normalize_splits(payment_method: PaymentMethod, payments: &[TenderSplit]) -> CoreResult<NormalizedTender> {
    if payment_method == PaymentMethod::Loyalty {
        return Err(ValidationError::NotAllowed {
            field: "payments".to_string(),
            allowed: vec!["cash".to_string(), "card".to_string(), "bank_transfer".to_string()],
        }
        .into());
    }

    let mut distinct: Vec<TenderMethod> = Vec::new();
    let mut total = Money::zero();
    for split in payments {
        validate_payment_amount(split.amount_cents).map_err(|err| match err {
            ValidationError::MustBePositive { .. } => CoreError::InvalidPaymentAmount {
                reason: format!("{:?} split of {} must be positive", split.method, split.amount()),
            },
            other => CoreError::Validation(other),
        })?;
        if !distinct.contains(&split.method) {
            distinct.push(split.method);
        }
        total = total.checked_add(split.amount()).ok_or_else(|| ValidationError::OutOfRange {
            field: "payments".to_string(),
            min: 1,
            max: MAX_AMOUNT_CENTS,
        })?;
    }

    let method = match distinct.as_slice() {
        [only] => PaymentMethod::from(*only),
        _ => PaymentMethod::Split,
    };

    Ok(NormalizedTender {
        payment_method: method,
        amount_paid: total,
        payments: payments.to_vec(),
        points_redeemed: 0,
    })
}

/// Checks a loyalty tender against the attached customer.
///
/// A no-op for any other tender.
pub fn check_loyalty_tender(tender: &NormalizedTender, customer: Option<&Customer>) -> CoreResult<()> {
    if !tender.is_loyalty() {
        return Ok(());
    }
    let customer = customer.ok_or_else(|| ValidationError::Required {
        field: "customer_id".to_string(),
    })?;

    if customer.loyalty_points < tender.points_redeemed {
        return Err(CoreError::InsufficientLoyaltyPoints {
            required: tender.points_redeemed,
            available: customer.loyalty_points,
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
    use chrono::Utc;

    fn customer(points: i64) -> Customer {
        Customer {
            id: "C1".to_string(),
            name: "Ada".to_string(),
            loyalty_points: points,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_single_cash_tender() {
        let tender = normalize_tender(PaymentMethod::Cash, 2200, &[]).unwrap();
        assert_eq!(tender.payment_method, PaymentMethod::Cash);
        assert_eq!(tender.payments, vec![TenderSplit::new(TenderMethod::Cash, 2200)]);
        assert_eq!(tender.settle(Money::from_cents(2200), SaleStatus::Completed).unwrap(), Money::zero());
    }

    #[test]
    fn test_distinct_methods_force_split() {
        let splits = [
            TenderSplit::new(TenderMethod::Cash, 1000),
            TenderSplit::new(TenderMethod::Card, 1200),
        ];
        let tender = normalize_tender(PaymentMethod::Cash, 0, &splits).unwrap();

        assert_eq!(tender.payment_method, PaymentMethod::Split);
        assert_eq!(tender.amount_paid.cents(), 2200);
        let sum: Money = tender.payments.iter().map(TenderSplit::amount).sum();
        assert_eq!(sum, tender.amount_paid);
    }

    #[test]
    fn test_same_method_splits_are_not_split() {
        let splits = [
            TenderSplit::new(TenderMethod::Card, 500),
            TenderSplit::new(TenderMethod::Card, 700),
        ];
        let tender = normalize_tender(PaymentMethod::Split, 0, &splits).unwrap();
        assert_eq!(tender.payment_method, PaymentMethod::Card);
        assert_eq!(tender.payments.len(), 2);
    }

    #[test]
    fn test_invalid_splits() {
        let zero = [TenderSplit::new(TenderMethod::Cash, 0)];
        assert!(matches!(
            normalize_tender(PaymentMethod::Split, 0, &zero),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));

        let ok = [TenderSplit::new(TenderMethod::Cash, 100)];
        assert!(matches!(
            normalize_tender(PaymentMethod::Loyalty, 0, &ok),
            Err(CoreError::Validation(_))
        ));
        assert!(normalize_tender(PaymentMethod::Split, 100, &[]).is_err());
    }

    #[test]
    fn test_oversized_splits_are_rejected() {
        let huge = [
            TenderSplit::new(TenderMethod::Cash, i64::MAX),
            TenderSplit::new(TenderMethod::Card, 1),
        ];
        assert!(matches!(
            normalize_tender(PaymentMethod::Split, 0, &huge),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let at_ceiling = [
            TenderSplit::new(TenderMethod::Cash, MAX_AMOUNT_CENTS),
            TenderSplit::new(TenderMethod::Card, MAX_AMOUNT_CENTS),
        ];
        let tender = normalize_tender(PaymentMethod::Split, 0, &at_ceiling).unwrap();
        assert_eq!(tender.amount_paid.cents(), 2 * MAX_AMOUNT_CENTS);
    }

    #[test]
    fn test_settle_rules() {
        let total = Money::from_cents(2200);

        let cash = normalize_tender(PaymentMethod::Cash, 2500, &[]).unwrap();
        assert_eq!(cash.settle(total, SaleStatus::Completed).unwrap().cents(), 300);

        let short = normalize_tender(PaymentMethod::Cash, 2000, &[]).unwrap();
        assert!(short.settle(total, SaleStatus::Completed).is_err());
        assert_eq!(short.settle(total, SaleStatus::Draft).unwrap(), Money::zero());

        let card = normalize_tender(PaymentMethod::Card, 2500, &[]).unwrap();
        assert!(card.settle(total, SaleStatus::Completed).is_err());
    }

    #[test]
    fn test_loyalty_tender() {
        let tender = normalize_tender(PaymentMethod::Loyalty, 2001, &[]).unwrap();
        assert!(tender.payments.is_empty());
        assert_eq!(tender.points_redeemed, 21);

        assert!(check_loyalty_tender(&tender, Some(&customer(21))).is_ok());
        assert_eq!(
            check_loyalty_tender(&tender, Some(&customer(20))).unwrap_err(),
            CoreError::InsufficientLoyaltyPoints {
                required: 21,
                available: 20
            }
        );
        assert!(matches!(
            check_loyalty_tender(&tender, None),
            Err(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }
}

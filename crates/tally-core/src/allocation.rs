//! # Inventory Allocator
//!
//! Plans FIFO lot consumption. Pure: the plan records what each batch held
//! when it was read so the stock mutator can apply it with compare-and-swap.
//!
//! ## FIFO Walk
//! ```text
//! need 8 of P1
//!
//!   B1 (t₁, remaining 5) ──► take 5, previous 5   need 3
//!   B2 (t₂, remaining 10) ─► take 3, previous 10  need 0  ✓
//!   B3 (t₃, ...)             untouched
//!
//! An expired batch reached while need > 0 ──► ExpiredBatch
//! Batches exhausted while need > 0         ──► InsufficientStock
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::pricing::PricedLine;
use crate::types::ProductBatch;

/// One planned decrement of one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDeduction {
    pub batch_id: String,
    pub quantity: i64,
    /// `quantity_remaining` observed when planning; the CAS expectation.
    pub previous_remaining: i64,
}

impl BatchDeduction {
    /// Value the batch holds after this deduction.
    pub fn new_remaining(&self) -> i64 {
        self.previous_remaining - self.quantity
    }
}

/// All deductions for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAllocation {
    pub product_id: String,
    pub quantity: i64,
    pub deductions: Vec<BatchDeduction>,
}

/// Sums required quantity per product, keeping first-seen product order.
///
/// A product appearing on several lines is allocated once for the total.
pub fn aggregate_requirements(lines: &[PricedLine]) -> Vec<(String, i64)> {
    let mut required: Vec<(String, i64)> = Vec::new();
    for line in lines {
        match required.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => required.push((line.product_id.clone(), line.quantity)),
        }
    }
    required
}

/// Plans consumption of `required` units of `product_id` from `batches`.
///
/// `batches` need not be pre-sorted or pre-filtered; empty batches are
/// skipped and the rest are walked oldest `created_at` first (ties broken by
/// id so the plan is deterministic).
pub fn plan_product(
    product_id: &str,
    required: i64,
    batches: &[ProductBatch],
    today: NaiveDate,
) -> CoreResult<ProductAllocation> {
    let mut ordered: Vec<&ProductBatch> = batches
        .iter()
        .filter(|b| b.product_id == product_id && b.quantity_remaining > 0)
        .collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let mut outstanding = required;
    let mut deductions = Vec::new();

    for batch in ordered {
        if outstanding == 0 {
            break;
        }
        if batch.is_expired(today) {
            return Err(CoreError::ExpiredBatch {
                product_id: product_id.to_string(),
                batch_id: batch.id.clone(),
            });
        }

        let take = outstanding.min(batch.quantity_remaining);
        deductions.push(BatchDeduction {
            batch_id: batch.id.clone(),
            quantity: take,
            previous_remaining: batch.quantity_remaining,
        });
        outstanding -= take;
    }

    if outstanding > 0 {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            available: required - outstanding,
            requested: required,
        });
    }

    Ok(ProductAllocation {
        product_id: product_id.to_string(),
        quantity: required,
        deductions,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 15).unwrap()
    }

    fn batch(id: &str, age_days: i64, remaining: i64, expiry: Option<NaiveDate>) -> ProductBatch {
        let base = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        ProductBatch {
            id: id.to_string(),
            product_id: "P1".to_string(),
            batch_number: format!("LOT-{}", id),
            quantity_initial: remaining,
            quantity_remaining: remaining,
            expiry_date: expiry,
            created_at: base - Duration::days(age_days),
        }
    }

    #[test]
    fn test_fifo_consumes_oldest_first() {
        // Passed newest-first to prove the planner orders by created_at
        let batches = vec![batch("B2", 1, 10, None), batch("B1", 5, 5, None)];
        let plan = plan_product("P1", 8, &batches, today()).unwrap();

        assert_eq!(
            plan.deductions,
            vec![
                BatchDeduction {
                    batch_id: "B1".to_string(),
                    quantity: 5,
                    previous_remaining: 5
                },
                BatchDeduction {
                    batch_id: "B2".to_string(),
                    quantity: 3,
                    previous_remaining: 10
                },
            ]
        );
        assert_eq!(plan.deductions[1].new_remaining(), 7);
    }

    #[test]
    fn test_newer_batch_untouched_when_oldest_suffices() {
        let batches = vec![batch("B1", 5, 5, None), batch("B2", 1, 10, None)];
        let plan = plan_product("P1", 5, &batches, today()).unwrap();
        assert_eq!(plan.deductions.len(), 1);
        assert_eq!(plan.deductions[0].batch_id, "B1");
    }

    #[test]
    fn test_expired_batch_blocks_allocation() {
        let yesterday = today().pred_opt().unwrap();
        let batches = vec![batch("B1", 5, 2, None), batch("B2", 1, 5, Some(yesterday))];

        let err = plan_product("P1", 4, &batches, today()).unwrap_err();
        assert_eq!(
            err,
            CoreError::ExpiredBatch {
                product_id: "P1".to_string(),
                batch_id: "B2".to_string()
            }
        );
    }

    #[test]
    fn test_expired_batch_after_requirement_met_is_ignored() {
        let yesterday = today().pred_opt().unwrap();
        let batches = vec![batch("B1", 5, 5, None), batch("B2", 1, 5, Some(yesterday))];
        assert!(plan_product("P1", 5, &batches, today()).is_ok());
    }

    #[test]
    fn test_insufficient_stock() {
        let batches = vec![batch("B1", 5, 2, None), batch("B0", 6, 0, None)];
        let err = plan_product("P1", 3, &batches, today()).unwrap_err();
        assert_eq!(
            err,
            CoreError::InsufficientStock {
                product_id: "P1".to_string(),
                available: 2,
                requested: 3
            }
        );
    }

    #[test]
    fn test_aggregate_requirements_merges_lines() {
        use crate::money::Money;
        let line = |id: &str, qty: i64| PricedLine {
            product_id: id.to_string(),
            name: id.to_string(),
            quantity: qty,
            unit_price: Money::zero(),
            sub_total: Money::zero(),
            discount: Money::zero(),
            tax: Money::zero(),
        };
        let req = aggregate_requirements(&[line("P2", 1), line("P1", 2), line("P2", 3)]);
        assert_eq!(req, vec![("P2".to_string(), 4), ("P1".to_string(), 2)]);
    }
}

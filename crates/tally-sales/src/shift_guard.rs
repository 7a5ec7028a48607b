//! # Shift Guard
//!
//! Every sale must belong to an open shift of its cashier. Closing a shift
//! reconciles the drawer from the persisted sale rows, never from running
//! totals.
//!
//! ```text
//! close_shift(cashier, counted)
//!   open shift ──► completed sales ──► Σ cash retained ──► reconcile
//!        │
//!        ▼
//!   CAS open → closed   (a concurrent close loses and gets an error)
//! ```

use chrono::Utc;
use tracing::{debug, info, warn};

use tally_core::shift::{cash_retained, reconcile};
use tally_core::{Money, SaleStatus, ShiftSession, ValidationError};

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{SaleError, SaleResult};
use crate::store::{SaleStore, ShiftStore};

/// The open shift a sale by `cashier_id` is booked against.
///
/// With several open shifts (which should not happen) the oldest wins and
/// the anomaly is logged.
pub async fn require_open_shift<S>(store: &S, cashier_id: &str) -> SaleResult<ShiftSession>
where
    S: ShiftStore + ?Sized,
{
    let mut open = store.open_shifts(cashier_id).await?;
    if open.len() > 1 {
        warn!(
            cashier_id = %cashier_id,
            open_shifts = open.len(),
            "Cashier has more than one open shift; using the oldest"
        );
    }
    if open.is_empty() {
        return Err(SaleError::NoOpenShift {
            cashier_id: cashier_id.to_string(),
        });
    }
    let shift = open.swap_remove(0);
    debug!(cashier_id = %cashier_id, shift_id = %shift.id, "Open shift found");
    Ok(shift)
}

/// Closes the cashier's open shift against a counted drawer.
pub async fn close_shift<S>(
    store: &S,
    audit: &dyn AuditSink,
    cashier_id: &str,
    counted_cash_cents: i64,
) -> SaleResult<ShiftSession>
where
    S: ShiftStore + SaleStore + ?Sized,
{
    if counted_cash_cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "counted_cash".to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into());
    }

    let shift = require_open_shift(store, cashier_id).await?;

    // Refunded sales drop out here; partial return payouts record no tender
    // and are not deducted.
    let mut cash_sales = Money::zero();
    for sale in store.sales_for_shift(&shift.id, SaleStatus::Completed).await? {
        let payments = store.sale_payments(&sale.id).await?;
        cash_sales += cash_retained(&payments, Money::from_cents(sale.change_given_cents));
    }

    let reconciliation = reconcile(
        Money::from_cents(shift.starting_cash_cents),
        cash_sales,
        Money::from_cents(counted_cash_cents),
    );

    if !store
        .close_shift_if_open(&shift.id, &reconciliation, Utc::now())
        .await?
    {
        return Err(ValidationError::Conflict {
            reason: format!("shift {} was closed concurrently", shift.id),
        }
        .into());
    }

    let closed = store
        .shift(&shift.id)
        .await?
        .ok_or_else(|| SaleError::not_found("Shift", &shift.id))?;

    info!(
        shift_id = %closed.id,
        cash_sales = %reconciliation.cash_sales,
        expected = %reconciliation.expected_cash,
        difference = %reconciliation.difference,
        "Shift closed"
    );
    audit.record(AuditEvent::ShiftClosed {
        shift_id: closed.id.clone(),
        user_id: closed.user_id.clone(),
        difference_cents: reconciliation.difference.cents(),
    });

    Ok(closed)
}

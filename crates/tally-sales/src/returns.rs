//! # Return Reversal
//!
//! Full refunds and partial returns of completed sales.
//!
//! ```text
//! refund_sale                         return_items
//! ───────────                         ────────────
//! completed ─CAS─► refunded           validate lines against sold − returned
//!     │                                   │
//!     ▼                                   ▼
//! restore sold − returned             insert pending request
//! per product                             │
//!     │                                   ▼
//!     ▼                               re-check totals and sale status
//! audit                                   │
//!                                         ▼
//!                                     restore stock ─► pending ─CAS─► completed
//! ```
//!
//! Both paths restore product stock only; batches are not re-credited.
//! A failure unwinds what was done: refunds fall back to `completed`,
//! returns end up `rejected`.

use chrono::Utc;
use tracing::{info, warn};

use tally_core::validation::{validate_id, validate_quantity};
use tally_core::{
    CoreError, Money, ReturnLine, ReturnRequest, ReturnStatus, Sale, SaleItem, SaleStatus,
    StockMovement, ValidationError,
};
use tally_db::repository::returns::generate_return_id;

use crate::audit::{AuditEvent, AuditSink};
use crate::compensation::{CompensationLog, UndoStep};
use crate::error::{SaleError, SaleResult};
use crate::request::{RefundOutcome, ReturnLineRequest, ReturnOutcome};
use crate::stock::StockMutator;
use crate::store::PosStore;

/// Part of the grand total carried by `item`.
///
/// The grand total is cut at cumulative net totals in item-id order, so
/// the parts of all items add up to it exactly.
pub fn item_share(sale: &Sale, items: &[SaleItem], item: &SaleItem) -> Money {
    let mut ordered: Vec<&SaleItem> = items.iter().collect();
    ordered.sort_by(|a, b| a.id.cmp(&b.id));

    let total: i64 = ordered.iter().map(|i| i.net_total().cents()).sum();
    let before: i64 = ordered
        .iter()
        .take_while(|i| i.id != item.id)
        .map(|i| i.net_total().cents())
        .sum();
    let through = before + item.net_total().cents();

    let grand = sale.grand_total();
    grand.prorate(through, total) - grand.prorate(before, total)
}

/// Refund owed for `quantity` more units of `item` after
/// `already_returned` units were claimed by earlier returns.
///
/// Each return takes the slice of the item's share between the units
/// returned before it and after it. Sale-level discounts reduce the refund,
/// and a run of returns adds up to the item's share without rounding past it.
pub fn line_refund(sale: &Sale, items: &[SaleItem], item: &SaleItem, already_returned: i64, quantity: i64) -> Money {
    let share = item_share(sale, items, item);
    share.prorate(already_returned + quantity, item.quantity) - share.prorate(already_returned, item.quantity)
}

pub struct ReturnReversal<'a, S: ?Sized> {
    store: &'a S,
    audit: &'a dyn AuditSink,
    max_attempts: u32,
}

impl<'a, S> ReturnReversal<'a, S>
where
    S: PosStore + ?Sized,
{
    pub fn new(store: &'a S, audit: &'a dyn AuditSink, max_attempts: u32) -> Self {
        ReturnReversal {
            store,
            audit,
            max_attempts,
        }
    }

    // =========================================================================
    // Full Refund
    // =========================================================================

    /// Marks a completed sale refunded and puts its stock back.
    ///
    /// Returns still pending are rejected first; their own unwinding takes
    /// back whatever stock they restored. Units of completed returns are not
    /// restored twice.
    /// A second call fails with [`SaleError::AlreadyRefunded`] and changes
    /// nothing.
    pub async fn refund_sale(&self, sale_id: &str, actor: &str) -> SaleResult<RefundOutcome> {
        validate_id("actor", actor)?;
        let sale = self.completed_sale(sale_id).await?;

        if !self
            .store
            .transition_sale(sale_id, SaleStatus::Completed, SaleStatus::Refunded, None)
            .await?
        {
            // lost the race; report what won
            return Err(self.status_error(sale_id).await);
        }

        let mut log = CompensationLog::new();
        log.push(UndoStep::RevertSaleStatus {
            sale_id: sale_id.to_string(),
            from: SaleStatus::Refunded,
            to: SaleStatus::Completed,
        });

        let restored = self.restore_unreturned(&sale, actor, &mut log).await;
        let movements = match restored {
            Ok(movements) => movements,
            Err(err) => {
                let failures = log.unwind(self.store, &err.to_string(), self.max_attempts).await;
                return Err(err.with_rollback_failures(failures));
            }
        };

        let restored_units: i64 = movements.iter().map(|m| m.quantity_change).sum();
        info!(
            sale_id = %sale_id,
            actor = %actor,
            restored_units,
            "Sale refunded"
        );
        self.audit.record(AuditEvent::SaleRefunded {
            sale_id: sale_id.to_string(),
            actor: actor.to_string(),
            restored_units,
        });

        let mut sale = sale;
        sale.status = SaleStatus::Refunded;
        sale.updated_at = Utc::now();
        Ok(RefundOutcome { sale, movements })
    }

    async fn restore_unreturned(
        &self,
        sale: &Sale,
        actor: &str,
        log: &mut CompensationLog,
    ) -> SaleResult<Vec<StockMovement>> {
        for return_id in self.store.pending_returns(&sale.id).await? {
            if self
                .store
                .transition_return(&return_id, ReturnStatus::Pending, ReturnStatus::Rejected, 0)
                .await?
            {
                warn!(sale_id = %sale.id, return_id = %return_id, "Pending return rejected by full refund");
            }
        }

        let items = self.store.sale_items(&sale.id).await?;
        let returned = self.store.completed_return_quantities(&sale.id).await?;

        let mut per_product: Vec<(String, i64)> = Vec::new();
        for item in &items {
            let already = returned.get(&item.id).copied().unwrap_or(0);
            let quantity = (item.quantity - already).max(0);
            match per_product.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += quantity,
                None => per_product.push((item.product_id.clone(), quantity)),
            }
        }

        let mutator = StockMutator::new(self.store, actor, self.max_attempts);
        let mut movements = Vec::new();
        for (product_id, quantity) in per_product {
            if quantity == 0 {
                continue;
            }
            movements.push(mutator.restore(&product_id, quantity, &sale.id, log).await?);
        }
        Ok(movements)
    }

    // =========================================================================
    // Partial Return
    // =========================================================================

    /// Returns some units of a completed sale.
    ///
    /// ## Errors
    /// - `Validation` for an empty request or a non-positive quantity
    /// - `InvalidItem` when a line is not part of the sale or asks for more
    ///   than is still returnable
    /// - `AlreadyRefunded` when the sale was refunded in full
    pub async fn return_items(
        &self,
        sale_id: &str,
        lines: &[ReturnLineRequest],
        actor: &str,
        reason: Option<&str>,
    ) -> SaleResult<ReturnOutcome> {
        validate_id("actor", actor)?;
        if lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }

        let sale = self.completed_sale(sale_id).await?;
        let items = self.store.sale_items(sale_id).await?;

        let mut requested: Vec<(&SaleItem, i64)> = Vec::new();
        for line in lines {
            validate_quantity(line.quantity)?;
            let item = items
                .iter()
                .find(|item| item.id == line.sale_item_id)
                .ok_or_else(|| CoreError::InvalidItem {
                    product_id: line.sale_item_id.clone(),
                    reason: format!("not part of sale {}", sale_id),
                })?;
            match requested.iter_mut().find(|(seen, _)| seen.id == item.id) {
                Some((_, qty)) => *qty += line.quantity,
                None => requested.push((item, line.quantity)),
            }
        }

        let returned = self.store.returned_quantities(sale_id).await?;
        for (item, quantity) in &requested {
            check_returnable(item, *quantity, returned.get(&item.id).copied().unwrap_or(0))?;
        }

        // persist as pending
        let now = Utc::now();
        let return_id = generate_return_id();
        let return_lines: Vec<ReturnLine> = requested
            .iter()
            .map(|(item, quantity)| ReturnLine {
                id: generate_return_id(),
                return_id: return_id.clone(),
                sale_item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                quantity: *quantity,
                refund_amount_cents: line_refund(
                    &sale,
                    &items,
                    item,
                    returned.get(&item.id).copied().unwrap_or(0),
                    *quantity,
                )
                .cents(),
            })
            .collect();
        let refund_total: i64 = return_lines.iter().map(|l| l.refund_amount_cents).sum();
        let mut request = ReturnRequest {
            id: return_id.clone(),
            sale_id: sale_id.to_string(),
            status: ReturnStatus::Pending,
            refund_amount_cents: 0,
            reason: reason.map(str::to_string),
            created_by: actor.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_return(&request, &return_lines).await?;

        let mut log = CompensationLog::new();
        log.push(UndoStep::RejectReturn {
            return_id: return_id.clone(),
        });

        let completed = self
            .complete_return(&sale, &requested, &return_id, refund_total, actor, &mut log)
            .await;
        let movements = match completed {
            Ok(movements) => movements,
            Err(err) => {
                let reason = err.to_string();
                let failures = log.unwind(self.store, &reason, self.max_attempts).await;
                self.audit.record(AuditEvent::ReturnRejected {
                    return_id,
                    sale_id: sale_id.to_string(),
                    reason,
                });
                return Err(err.with_rollback_failures(failures));
            }
        };

        info!(
            return_id = %return_id,
            sale_id = %sale_id,
            refund_amount = %Money::from_cents(refund_total),
            lines = return_lines.len(),
            "Return completed"
        );
        self.audit.record(AuditEvent::ReturnCompleted {
            return_id: return_id.clone(),
            sale_id: sale_id.to_string(),
            refund_amount_cents: refund_total,
        });

        request.status = ReturnStatus::Completed;
        request.refund_amount_cents = refund_total;
        request.updated_at = Utc::now();
        Ok(ReturnOutcome {
            request,
            lines: return_lines,
            movements,
        })
    }

    async fn complete_return(
        &self,
        sale: &Sale,
        requested: &[(&SaleItem, i64)],
        return_id: &str,
        refund_total: i64,
        actor: &str,
        log: &mut CompensationLog,
    ) -> SaleResult<Vec<StockMovement>> {
        // A concurrent return or refund may have landed between the checks
        // and the insert. Totals now include this request.
        let returned = self.store.returned_quantities(&sale.id).await?;
        for (item, _) in requested {
            let claimed = returned.get(&item.id).copied().unwrap_or(0);
            if claimed > item.quantity {
                warn!(sale_item_id = %item.id, claimed, sold = item.quantity, "Concurrent over-return");
                return Err(ValidationError::Conflict {
                    reason: format!("sale item {} was returned concurrently", item.id),
                }
                .into());
            }
        }
        self.completed_sale(&sale.id).await?;

        let mut per_product: Vec<(String, i64)> = Vec::new();
        for (item, quantity) in requested {
            match per_product.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += quantity,
                None => per_product.push((item.product_id.clone(), *quantity)),
            }
        }

        let mutator = StockMutator::new(self.store, actor, self.max_attempts);
        let mut movements = Vec::with_capacity(per_product.len());
        for (product_id, quantity) in per_product {
            movements.push(mutator.restore(&product_id, quantity, return_id, log).await?);
        }

        if !self
            .store
            .transition_return(return_id, ReturnStatus::Pending, ReturnStatus::Completed, refund_total)
            .await?
        {
            return Err(ValidationError::Conflict {
                reason: format!("return {} is no longer pending", return_id),
            }
            .into());
        }
        Ok(movements)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn completed_sale(&self, sale_id: &str) -> SaleResult<Sale> {
        let sale = self
            .store
            .sale(sale_id)
            .await?
            .ok_or_else(|| SaleError::not_found("Sale", sale_id))?;
        match sale.status {
            SaleStatus::Completed => Ok(sale),
            SaleStatus::Refunded => Err(SaleError::AlreadyRefunded {
                sale_id: sale_id.to_string(),
            }),
            other => Err(ValidationError::Conflict {
                reason: format!("sale {} is {} and cannot be reversed", sale_id, other.as_str()),
            }
            .into()),
        }
    }

    async fn status_error(&self, sale_id: &str) -> SaleError {
        match self.completed_sale(sale_id).await {
            Err(err) => err,
            Ok(_) => ValidationError::Conflict {
                reason: format!("sale {} changed during refund", sale_id),
            }
            .into(),
        }
    }
}

fn check_returnable(item: &SaleItem, quantity: i64, already_returned: i64) -> SaleResult<()> {
    let returnable = item.quantity - already_returned;
    if quantity > returnable {
        return Err(CoreError::InvalidItem {
            product_id: item.product_id.clone(),
            reason: format!(
                "return of {} exceeds {} returnable of sale item {}",
                quantity, returnable, item.id
            ),
        }
        .into());
    }
    Ok(())
}

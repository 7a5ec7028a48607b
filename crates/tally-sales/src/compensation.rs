//! # Compensation Log
//!
//! Each persisted mutation pushes the step that undoes it. On failure the
//! log is unwound last-in first-out; a failing undo step is recorded and
//! unwinding continues with the next one.
//!
//! ```text
//! push:   VoidSale ─► RestoreProductStock(P1) ─► RestoreBatch(B1) ─► DeleteMovement(M1) ─► ...
//! unwind: ... ─► DeleteMovement(M1) ─► RestoreBatch(B1) ─► RestoreProductStock(P1) ─► VoidSale
//! ```

use std::fmt;

use tracing::{debug, error, warn};

use tally_core::{ReturnStatus, SaleStatus};

use crate::cas::{self, CasError};
use crate::error::StoreError;
use crate::store::{Counter, PosStore};

/// A typed undo descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoStep {
    /// Give back units taken from a batch.
    RestoreBatch { batch_id: String, quantity: i64 },
    /// Give back units taken from product stock.
    RestoreProductStock { product_id: String, quantity: i64 },
    /// Take away units a refund put back.
    RemoveProductStock { product_id: String, quantity: i64 },
    DeleteMovement { movement_id: String },
    /// Mark a sale voided with the failure reason in its notes.
    VoidSale { sale_id: String, from: SaleStatus },
    RevertSaleStatus {
        sale_id: String,
        from: SaleStatus,
        to: SaleStatus,
    },
    RejectReturn { return_id: String },
}

impl fmt::Display for UndoStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoStep::RestoreBatch { batch_id, quantity } => {
                write!(f, "restore {} to batch {}", quantity, batch_id)
            }
            UndoStep::RestoreProductStock { product_id, quantity } => {
                write!(f, "restore {} to stock of {}", quantity, product_id)
            }
            UndoStep::RemoveProductStock { product_id, quantity } => {
                write!(f, "remove {} from stock of {}", quantity, product_id)
            }
            UndoStep::DeleteMovement { movement_id } => write!(f, "delete movement {}", movement_id),
            UndoStep::VoidSale { sale_id, .. } => write!(f, "void sale {}", sale_id),
            UndoStep::RevertSaleStatus { sale_id, from, to } => {
                write!(f, "revert sale {} from {} to {}", sale_id, from.as_str(), to.as_str())
            }
            UndoStep::RejectReturn { return_id } => write!(f, "reject return {}", return_id),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum UndoError {
    #[error(transparent)]
    Cas(#[from] CasError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("row was not in the expected state")]
    StateChanged,
}

impl UndoStep {
    async fn apply<S>(&self, store: &S, reason: &str, max_attempts: u32) -> Result<(), UndoError>
    where
        S: PosStore + ?Sized,
    {
        match self {
            UndoStep::RestoreBatch { batch_id, quantity } => {
                let counter = Counter::BatchRemaining(batch_id.clone());
                cas::add(store, &counter, *quantity, max_attempts).await?;
            }
            UndoStep::RestoreProductStock { product_id, quantity } => {
                let counter = Counter::ProductStock(product_id.clone());
                cas::add(store, &counter, *quantity, max_attempts).await?;
            }
            UndoStep::RemoveProductStock { product_id, quantity } => {
                let counter = Counter::ProductStock(product_id.clone());
                cas::adjust(store, &counter, max_attempts, |current| {
                    current.checked_sub(*quantity).filter(|next| *next >= 0)
                })
                .await?;
            }
            UndoStep::DeleteMovement { movement_id } => {
                if !store.delete_movement(movement_id).await? {
                    debug!(movement_id = %movement_id, "Movement already gone");
                }
            }
            UndoStep::VoidSale { sale_id, from } => {
                if !store
                    .transition_sale(sale_id, *from, SaleStatus::Voided, Some(reason))
                    .await?
                {
                    return Err(UndoError::StateChanged);
                }
            }
            UndoStep::RevertSaleStatus { sale_id, from, to } => {
                if !store.transition_sale(sale_id, *from, *to, None).await? {
                    return Err(UndoError::StateChanged);
                }
            }
            UndoStep::RejectReturn { return_id } => {
                if !store
                    .transition_return(return_id, ReturnStatus::Pending, ReturnStatus::Rejected, 0)
                    .await?
                {
                    // a full refund of the sale may have rejected it first
                    let current = store.return_request(return_id).await?.map(|r| r.status);
                    if current != Some(ReturnStatus::Rejected) {
                        return Err(UndoError::StateChanged);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Undo steps in the order their mutations happened.
#[derive(Debug, Default)]
pub struct CompensationLog {
    steps: Vec<UndoStep>,
}

impl CompensationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: UndoStep) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[UndoStep] {
        &self.steps
    }

    /// Applies and drains every step, newest first.
    ///
    /// Returns one message per step that could not be undone.
    pub async fn unwind<S>(&mut self, store: &S, reason: &str, max_attempts: u32) -> Vec<String>
    where
        S: PosStore + ?Sized,
    {
        warn!(steps = self.steps.len(), reason = %reason, "Compensating");

        let mut failures = Vec::new();
        while let Some(step) = self.steps.pop() {
            match step.apply(store, reason, max_attempts).await {
                Ok(()) => debug!(step = %step, "Undo step applied"),
                Err(e) => {
                    error!(step = %step, error = %e, "Undo step failed");
                    failures.push(format!("{}: {}", step, e));
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::Utc;
    use tally_core::{MovementKind, Product, StockMovement};

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            price_cents: 500,
            cost_price_cents: 300,
            tax_rate_bps: 0,
            stock_quantity: stock,
            reorder_level: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn movement(id: &str) -> StockMovement {
        StockMovement {
            id: id.to_string(),
            product_id: "P1".to_string(),
            batch_id: None,
            kind: MovementKind::Sale,
            quantity_change: -1,
            reference_id: "S1".to_string(),
            created_by: "cashier-1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unwind_is_lifo_and_drains() {
        use crate::store::MovementStore;

        let store = InMemoryStore::new();
        store.add_product(product("P1", 2));
        store.insert_movement(&movement("M1")).await.unwrap();

        let mut log = CompensationLog::new();
        log.push(UndoStep::RestoreProductStock {
            product_id: "P1".into(),
            quantity: 3,
        });
        log.push(UndoStep::RemoveProductStock {
            product_id: "P1".into(),
            quantity: 4,
        });
        log.push(UndoStep::DeleteMovement {
            movement_id: "M1".into(),
        });

        // the removal runs before the restore, sees 2 and is rejected
        let failures = log.unwind(&store, "test", 8).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("remove 4 from stock of P1"));
        assert_eq!(store.product_stock("P1"), Some(5));
        assert!(store.all_movements().is_empty());
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_reject_of_already_rejected_return() {
        use crate::store::ReturnStore;
        use tally_core::{ReturnRequest, ReturnStatus};

        let store = InMemoryStore::new();
        let now = Utc::now();
        let request = |id: &str, status| ReturnRequest {
            id: id.to_string(),
            sale_id: "S1".to_string(),
            status,
            refund_amount_cents: 0,
            reason: None,
            created_by: "manager-1".to_string(),
            created_at: now,
            updated_at: now,
        };
        store.insert_return(&request("R1", ReturnStatus::Rejected), &[]).await.unwrap();
        store.insert_return(&request("R2", ReturnStatus::Completed), &[]).await.unwrap();

        let mut log = CompensationLog::new();
        log.push(UndoStep::RejectReturn { return_id: "R1".into() });
        assert!(log.unwind(&store, "test", 8).await.is_empty());

        log.push(UndoStep::RejectReturn { return_id: "R2".into() });
        let failures = log.unwind(&store, "test", 8).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].starts_with("reject return R2"));
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_unwinding() {
        let store = InMemoryStore::new();
        store.add_product(product("P1", 0));
        store.set_fail_on_movement_delete(true);

        let mut log = CompensationLog::new();
        log.push(UndoStep::RestoreProductStock {
            product_id: "P1".into(),
            quantity: 2,
        });
        log.push(UndoStep::DeleteMovement {
            movement_id: "M1".into(),
        });

        let failures = log.unwind(&store, "boom", 8).await;
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("delete movement M1"));
        assert_eq!(store.product_stock("P1"), Some(2));
    }
}

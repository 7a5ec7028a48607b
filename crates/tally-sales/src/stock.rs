//! # Stock Mutator
//!
//! Executes a FIFO plan against the store.
//!
//! ```text
//! per product:
//!   1. decrement_if_sufficient(stock, qty)     false ⇒ InsufficientStock
//!   2. per batch: try_update(remaining, prev, prev − take)
//!                                              false ⇒ InventoryConflict (no retry)
//!   3. per batch: StockMovement(sale, −take, batch_id)
//! ```
//!
//! Each mutation pushes its undo step the moment it succeeds.

use chrono::Utc;
use tracing::{debug, info};

use tally_core::{CoreError, MovementKind, ProductAllocation, StockMovement};
use tally_db::repository::movement::generate_movement_id;

use crate::cas;
use crate::compensation::{CompensationLog, UndoStep};
use crate::error::{SaleError, SaleResult};
use crate::store::{Counter, PosStore};

pub struct StockMutator<'a, S: ?Sized> {
    store: &'a S,
    actor: &'a str,
    max_attempts: u32,
}

impl<'a, S> StockMutator<'a, S>
where
    S: PosStore + ?Sized,
{
    pub fn new(store: &'a S, actor: &'a str, max_attempts: u32) -> Self {
        StockMutator {
            store,
            actor,
            max_attempts,
        }
    }

    /// Applies one product's allocation for sale `sale_id`.
    pub async fn deduct(
        &self,
        allocation: &ProductAllocation,
        sale_id: &str,
        log: &mut CompensationLog,
    ) -> SaleResult<Vec<StockMovement>> {
        let product_id = &allocation.product_id;

        if !self
            .store
            .decrement_if_sufficient(product_id, allocation.quantity)
            .await?
        {
            let available = self
                .store
                .load(&Counter::ProductStock(product_id.clone()))
                .await?
                .unwrap_or(0);
            return Err(CoreError::InsufficientStock {
                product_id: product_id.clone(),
                available,
                requested: allocation.quantity,
            }
            .into());
        }
        log.push(UndoStep::RestoreProductStock {
            product_id: product_id.clone(),
            quantity: allocation.quantity,
        });

        let mut movements = Vec::with_capacity(allocation.deductions.len());
        for deduction in &allocation.deductions {
            let counter = Counter::BatchRemaining(deduction.batch_id.clone());
            if !self
                .store
                .try_update(&counter, deduction.previous_remaining, deduction.new_remaining())
                .await?
            {
                return Err(SaleError::InventoryConflict {
                    product_id: product_id.clone(),
                    batch_id: deduction.batch_id.clone(),
                });
            }
            log.push(UndoStep::RestoreBatch {
                batch_id: deduction.batch_id.clone(),
                quantity: deduction.quantity,
            });

            let movement = StockMovement {
                id: generate_movement_id(),
                product_id: product_id.clone(),
                batch_id: Some(deduction.batch_id.clone()),
                kind: MovementKind::Sale,
                quantity_change: -deduction.quantity,
                reference_id: sale_id.to_string(),
                created_by: self.actor.to_string(),
                created_at: Utc::now(),
            };
            self.store.insert_movement(&movement).await?;
            log.push(UndoStep::DeleteMovement {
                movement_id: movement.id.clone(),
            });

            debug!(
                sale_id = %sale_id,
                product_id = %product_id,
                batch_id = %deduction.batch_id,
                quantity = deduction.quantity,
                remaining = deduction.new_remaining(),
                "Batch deducted"
            );
            movements.push(movement);
        }

        Ok(movements)
    }

    /// Puts `quantity` back on product stock for a refund or return.
    ///
    /// Only the product counter moves; batches are not re-credited.
    pub async fn restore(
        &self,
        product_id: &str,
        quantity: i64,
        reference_id: &str,
        log: &mut CompensationLog,
    ) -> SaleResult<StockMovement> {
        let counter = Counter::ProductStock(product_id.to_string());
        let adjusted = cas::add(self.store, &counter, quantity, self.max_attempts).await?;
        log.push(UndoStep::RemoveProductStock {
            product_id: product_id.to_string(),
            quantity,
        });

        let movement = StockMovement {
            id: generate_movement_id(),
            product_id: product_id.to_string(),
            batch_id: None,
            kind: MovementKind::Return,
            quantity_change: quantity,
            reference_id: reference_id.to_string(),
            created_by: self.actor.to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_movement(&movement).await?;
        log.push(UndoStep::DeleteMovement {
            movement_id: movement.id.clone(),
        });

        info!(
            product_id = %product_id,
            quantity,
            stock = adjusted.current,
            reference_id = %reference_id,
            "Stock restored"
        );
        Ok(movement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::memory::InMemoryStore;
    use chrono::Duration;
    use tally_core::allocation::plan_product;
    use tally_core::{Product, ProductBatch};

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store.add_product(Product {
            id: "P1".into(),
            sku: "SKU-P1".into(),
            name: "Milk".into(),
            price_cents: 250,
            cost_price_cents: 150,
            tax_rate_bps: 0,
            stock_quantity: 15,
            reorder_level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        for (id, age, qty) in [("B1", 10, 5), ("B2", 1, 10)] {
            store.add_batch(ProductBatch {
                id: id.into(),
                product_id: "P1".into(),
                batch_number: format!("LOT-{}", id),
                quantity_initial: qty,
                quantity_remaining: qty,
                expiry_date: None,
                created_at: now - Duration::days(age),
            });
        }
        store
    }

    async fn plan(store: &InMemoryStore, qty: i64) -> ProductAllocation {
        use crate::store::CatalogStore;
        let batches = store.batches_for("P1").await.unwrap();
        plan_product("P1", qty, &batches, Utc::now().date_naive()).unwrap()
    }

    #[tokio::test]
    async fn test_deduct_fifo_with_movements() {
        let store = seeded();
        let allocation = plan(&store, 8).await;
        let mut log = CompensationLog::new();

        let movements = StockMutator::new(&store, "cashier-1", 8)
            .deduct(&allocation, "S1", &mut log)
            .await
            .unwrap();

        assert_eq!(store.product_stock("P1"), Some(7));
        assert_eq!(store.batch_remaining("B1"), Some(0));
        assert_eq!(store.batch_remaining("B2"), Some(7));
        let changes: Vec<i64> = movements.iter().map(|m| m.quantity_change).collect();
        assert_eq!(changes, vec![-5, -3]);
        // stock + 2 × (batch, movement)
        assert_eq!(log.len(), 5);
    }

    #[tokio::test]
    async fn test_batch_conflict_aborts_with_undo_for_stock() {
        let store = seeded();
        let allocation = plan(&store, 8).await;
        store.conflict_on_batch("B2");
        let mut log = CompensationLog::new();

        let err = StockMutator::new(&store, "cashier-1", 8)
            .deduct(&allocation, "S1", &mut log)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InventoryConflict);

        let failures = log.unwind(&store, "conflict", 8).await;
        assert!(failures.is_empty());
        assert_eq!(store.product_stock("P1"), Some(15));
        assert_eq!(store.batch_remaining("B1"), Some(5));
        assert!(store.all_movements().is_empty());
    }

    #[tokio::test]
    async fn test_short_stock_counter() {
        let store = seeded();
        let allocation = plan(&store, 15).await;
        use crate::store::CounterStore;
        store.decrement_if_sufficient("P1", 1).await.unwrap();

        let mut log = CompensationLog::new();
        let err = StockMutator::new(&store, "cashier-1", 8)
            .deduct(&allocation, "S1", &mut log)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SaleError::Core(CoreError::InsufficientStock { available: 14, requested: 15, .. })
        ));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_restore_records_return_movement() {
        let store = seeded();
        let mut log = CompensationLog::new();

        let movement = StockMutator::new(&store, "manager-1", 8)
            .restore("P1", 2, "S1", &mut log)
            .await
            .unwrap();

        assert_eq!(movement.kind, MovementKind::Return);
        assert_eq!(movement.quantity_change, 2);
        assert_eq!(movement.batch_id, None);
        assert_eq!(store.product_stock("P1"), Some(17));
        assert_eq!(log.len(), 2);
    }
}

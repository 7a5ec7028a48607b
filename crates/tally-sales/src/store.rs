//! # Store Collaborators
//!
//! Everything the engine reads or writes goes through these traits, so the
//! saga can run against SQLite ([`crate::SqliteStore`]) or the in-memory
//! store used by tests ([`crate::InMemoryStore`]).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PosStore = ShiftStore + CatalogStore + CounterStore                    │
//! │           + SaleStore + MovementStore + ReturnStore                     │
//! │                                                                         │
//! │  CounterStore::try_update(counter, expected, new) -> bool               │
//! │    the only way shared counters move (besides decrement_if_sufficient) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_core::shift::ShiftReconciliation;
use tally_core::{
    Customer, Product, ProductBatch, Promotion, ReturnLine, ReturnRequest, ReturnStatus, Sale,
    SaleItem, SalePayment, SaleStatus, ShiftSession, StockMovement,
};

use crate::error::StoreResult;

/// A shared integer counter mutated only by compare-and-swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Counter {
    /// `Product.stock_quantity` by product id.
    ProductStock(String),
    /// `ProductBatch.quantity_remaining` by batch id.
    BatchRemaining(String),
    /// `Customer.loyalty_points` by customer id.
    LoyaltyPoints(String),
    /// Named sequence, e.g. `receipt:INV:2026`. Unset sequences read as 0.
    Sequence(String),
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Counter::ProductStock(id) => write!(f, "stock({})", id),
            Counter::BatchRemaining(id) => write!(f, "batch({})", id),
            Counter::LoyaltyPoints(id) => write!(f, "points({})", id),
            Counter::Sequence(key) => write!(f, "sequence({})", key),
        }
    }
}

#[async_trait]
pub trait ShiftStore: Send + Sync {
    /// Open sessions of `user_id`, oldest first.
    async fn open_shifts(&self, user_id: &str) -> StoreResult<Vec<ShiftSession>>;

    async fn shift(&self, id: &str) -> StoreResult<Option<ShiftSession>>;

    /// open → closed with the reconciliation figures. `false` if the shift
    /// was no longer open.
    async fn close_shift_if_open(
        &self,
        id: &str,
        reconciliation: &ShiftReconciliation,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Products with the given ids; unknown ids are omitted.
    async fn products(&self, ids: &[String]) -> StoreResult<Vec<Product>>;

    /// Batches of a product that still hold stock.
    async fn batches_for(&self, product_id: &str) -> StoreResult<Vec<ProductBatch>>;

    async fn customer(&self, id: &str) -> StoreResult<Option<Customer>>;

    async fn promotion(&self, code: &str) -> StoreResult<Option<Promotion>>;
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value, `None` when the owning row does not exist.
    async fn load(&self, counter: &Counter) -> StoreResult<Option<i64>>;

    /// Sets `counter` to `new` only if it still equals `expected`.
    async fn try_update(&self, counter: &Counter, expected: i64, new: i64) -> StoreResult<bool>;

    /// Decrements product stock only if at least `quantity` is on hand.
    async fn decrement_if_sufficient(&self, product_id: &str, quantity: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait SaleStore: Send + Sync {
    async fn insert_sale(&self, sale: &Sale) -> StoreResult<()>;

    /// Items and payments land together or not at all.
    async fn insert_lines(&self, items: &[SaleItem], payments: &[SalePayment]) -> StoreResult<()>;

    async fn sale(&self, id: &str) -> StoreResult<Option<Sale>>;

    async fn sale_items(&self, sale_id: &str) -> StoreResult<Vec<SaleItem>>;

    async fn sale_payments(&self, sale_id: &str) -> StoreResult<Vec<SalePayment>>;

    async fn sales_for_shift(&self, shift_id: &str, status: SaleStatus) -> StoreResult<Vec<Sale>>;

    /// Status CAS; `notes` replaces the stored notes when given.
    async fn transition_sale(
        &self,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
        notes: Option<&str>,
    ) -> StoreResult<bool>;
}

#[async_trait]
pub trait MovementStore: Send + Sync {
    async fn insert_movement(&self, movement: &StockMovement) -> StoreResult<()>;

    /// `false` when the movement was already gone.
    async fn delete_movement(&self, id: &str) -> StoreResult<bool>;

    async fn movements_for(&self, reference_id: &str) -> StoreResult<Vec<StockMovement>>;
}

#[async_trait]
pub trait ReturnStore: Send + Sync {
    async fn insert_return(&self, request: &ReturnRequest, lines: &[ReturnLine]) -> StoreResult<()>;

    async fn return_request(&self, id: &str) -> StoreResult<Option<ReturnRequest>>;

    async fn return_lines(&self, return_id: &str) -> StoreResult<Vec<ReturnLine>>;

    /// Quantity per sale item claimed by pending or completed returns.
    async fn returned_quantities(&self, sale_id: &str) -> StoreResult<HashMap<String, i64>>;

    /// Quantity per sale item whose stock a completed return already put back.
    async fn completed_return_quantities(&self, sale_id: &str) -> StoreResult<HashMap<String, i64>>;

    /// Ids of the sale's returns still in `pending`.
    async fn pending_returns(&self, sale_id: &str) -> StoreResult<Vec<String>>;

    async fn transition_return(
        &self,
        id: &str,
        from: ReturnStatus,
        to: ReturnStatus,
        refund_amount_cents: i64,
    ) -> StoreResult<bool>;
}

/// Everything the engine needs from persistence.
pub trait PosStore:
    ShiftStore + CatalogStore + CounterStore + SaleStore + MovementStore + ReturnStore
{
}

impl<T> PosStore for T where
    T: ShiftStore + CatalogStore + CounterStore + SaleStore + MovementStore + ReturnStore
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_display() {
        assert_eq!(Counter::BatchRemaining("B1".into()).to_string(), "batch(B1)");
        assert_eq!(
            Counter::Sequence("receipt:INV:2026".into()).to_string(),
            "sequence(receipt:INV:2026)"
        );
    }
}

//! In-memory [`PosStore`](crate::store::PosStore) with fault injection.
//!
//! Every trait call takes the state lock once, so each call is atomic the
//! way a single conditional UPDATE is. Faults make a chosen step fail so the
//! compensation paths can be driven deterministically.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_core::shift::ShiftReconciliation;
use tally_core::{
    Customer, Product, ProductBatch, Promotion, ReturnLine, ReturnRequest, ReturnStatus, Sale,
    SaleItem, SalePayment, SaleStatus, ShiftSession, ShiftStatus, StockMovement,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{
    CatalogStore, Counter, CounterStore, MovementStore, ReturnStore, SaleStore, ShiftStore,
};

#[derive(Debug, Default)]
struct Faults {
    stock_decrement: Option<String>,
    stock_restore: Option<String>,
    batch_conflict: Option<String>,
    lines_insert: bool,
    movement_insert_after: Option<usize>,
    movement_delete: bool,
    loyalty_update: bool,
    sale_transition: bool,
    sale_read: bool,
}

#[derive(Debug, Default)]
struct InMemoryState {
    products: HashMap<String, Product>,
    batches: HashMap<String, ProductBatch>,
    customers: HashMap<String, Customer>,
    promotions: HashMap<String, Promotion>,
    shifts: HashMap<String, ShiftSession>,
    sales: HashMap<String, Sale>,
    items: Vec<SaleItem>,
    payments: Vec<SalePayment>,
    movements: Vec<StockMovement>,
    returns: HashMap<String, ReturnRequest>,
    return_lines: Vec<ReturnLine>,
    sequences: HashMap<String, i64>,
    faults: Faults,
}

/// Shared-state store; clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

fn injected(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure: {}", what))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, InMemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    pub fn add_product(&self, product: Product) {
        self.state().products.insert(product.id.clone(), product);
    }

    pub fn add_batch(&self, batch: ProductBatch) {
        self.state().batches.insert(batch.id.clone(), batch);
    }

    pub fn add_customer(&self, customer: Customer) {
        self.state().customers.insert(customer.id.clone(), customer);
    }

    pub fn add_promotion(&self, promotion: Promotion) {
        self.state().promotions.insert(promotion.code.clone(), promotion);
    }

    pub fn add_shift(&self, shift: ShiftSession) {
        self.state().shifts.insert(shift.id.clone(), shift);
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    /// `decrement_if_sufficient` errors for this product.
    pub fn fail_stock_decrement_for(&self, product_id: &str) {
        self.state().faults.stock_decrement = Some(product_id.to_string());
    }

    /// Stock CAS (restores) errors for this product.
    pub fn fail_stock_restore_for(&self, product_id: &str) {
        self.state().faults.stock_restore = Some(product_id.to_string());
    }

    /// Batch CAS on this batch reports a lost race.
    pub fn conflict_on_batch(&self, batch_id: &str) {
        self.state().faults.batch_conflict = Some(batch_id.to_string());
    }

    pub fn set_fail_on_lines_insert(&self, fail: bool) {
        self.state().faults.lines_insert = fail;
    }

    /// Movement inserts error once `count` movements have been written.
    pub fn fail_movement_insert_after(&self, count: usize) {
        self.state().faults.movement_insert_after = Some(count);
    }

    pub fn set_fail_on_movement_delete(&self, fail: bool) {
        self.state().faults.movement_delete = fail;
    }

    pub fn set_fail_on_loyalty_update(&self, fail: bool) {
        self.state().faults.loyalty_update = fail;
    }

    pub fn set_fail_on_sale_transition(&self, fail: bool) {
        self.state().faults.sale_transition = fail;
    }

    pub fn set_fail_on_sale_read(&self, fail: bool) {
        self.state().faults.sale_read = fail;
    }

    pub fn clear_faults(&self) {
        self.state().faults = Faults::default();
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn product_stock(&self, product_id: &str) -> Option<i64> {
        self.state().products.get(product_id).map(|p| p.stock_quantity)
    }

    pub fn batch_remaining(&self, batch_id: &str) -> Option<i64> {
        self.state().batches.get(batch_id).map(|b| b.quantity_remaining)
    }

    pub fn customer_points(&self, customer_id: &str) -> Option<i64> {
        self.state().customers.get(customer_id).map(|c| c.loyalty_points)
    }

    pub fn all_sales(&self) -> Vec<Sale> {
        let mut sales: Vec<Sale> = self.state().sales.values().cloned().collect();
        sales.sort_by(|a, b| a.receipt_number.cmp(&b.receipt_number));
        sales
    }

    fn quantities_where(&self, sale_id: &str, counts: impl Fn(ReturnStatus) -> bool) -> HashMap<String, i64> {
        let state = self.state();
        let mut quantities: HashMap<String, i64> = HashMap::new();
        for line in &state.return_lines {
            let counted = state
                .returns
                .get(&line.return_id)
                .map(|r| r.sale_id == sale_id && counts(r.status))
                .unwrap_or(false);
            if counted {
                *quantities.entry(line.sale_item_id.clone()).or_insert(0) += line.quantity;
            }
        }
        quantities
    }

    pub fn all_movements(&self) -> Vec<StockMovement> {
        self.state().movements.clone()
    }

    pub fn sequence_value(&self, key: &str) -> i64 {
        self.state().sequences.get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ShiftStore for InMemoryStore {
    async fn open_shifts(&self, user_id: &str) -> StoreResult<Vec<ShiftSession>> {
        let mut open: Vec<ShiftSession> = self
            .state()
            .shifts
            .values()
            .filter(|s| s.user_id == user_id && s.status == ShiftStatus::Open)
            .cloned()
            .collect();
        open.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        Ok(open)
    }

    async fn shift(&self, id: &str) -> StoreResult<Option<ShiftSession>> {
        Ok(self.state().shifts.get(id).cloned())
    }

    async fn close_shift_if_open(
        &self,
        id: &str,
        reconciliation: &ShiftReconciliation,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        match state.shifts.get_mut(id) {
            Some(shift) if shift.status == ShiftStatus::Open => {
                shift.status = ShiftStatus::Closed;
                shift.end_time = Some(closed_at);
                shift.ending_cash_cents = Some(reconciliation.counted_cash.cents());
                shift.cash_sales_cents = reconciliation.cash_sales.cents();
                shift.expected_cash_cents = reconciliation.expected_cash.cents();
                shift.difference_cents = Some(reconciliation.difference.cents());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn products(&self, ids: &[String]) -> StoreResult<Vec<Product>> {
        let state = self.state();
        Ok(ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn batches_for(&self, product_id: &str) -> StoreResult<Vec<ProductBatch>> {
        let mut batches: Vec<ProductBatch> = self
            .state()
            .batches
            .values()
            .filter(|b| b.product_id == product_id && b.quantity_remaining > 0)
            .cloned()
            .collect();
        batches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(batches)
    }

    async fn customer(&self, id: &str) -> StoreResult<Option<Customer>> {
        Ok(self.state().customers.get(id).cloned())
    }

    async fn promotion(&self, code: &str) -> StoreResult<Option<Promotion>> {
        Ok(self.state().promotions.get(code).cloned())
    }
}

#[async_trait]
impl CounterStore for InMemoryStore {
    async fn load(&self, counter: &Counter) -> StoreResult<Option<i64>> {
        let state = self.state();
        Ok(match counter {
            Counter::ProductStock(id) => state.products.get(id).map(|p| p.stock_quantity),
            Counter::BatchRemaining(id) => state.batches.get(id).map(|b| b.quantity_remaining),
            Counter::LoyaltyPoints(id) => state.customers.get(id).map(|c| c.loyalty_points),
            Counter::Sequence(key) => Some(state.sequences.get(key).copied().unwrap_or(0)),
        })
    }

    async fn try_update(&self, counter: &Counter, expected: i64, new: i64) -> StoreResult<bool> {
        // counters carry a non-negative CHECK in SQLite; mirror it here
        if new < 0 {
            return Err(injected("negative counter"));
        }

        let mut guard = self.state();
        let state = &mut *guard;
        let faults = &state.faults;

        let slot: Option<&mut i64> = match counter {
            Counter::ProductStock(id) => {
                if faults.stock_restore.as_deref() == Some(id.as_str()) {
                    return Err(injected("stock update"));
                }
                state.products.get_mut(id).map(|p| &mut p.stock_quantity)
            }
            Counter::BatchRemaining(id) => {
                if faults.batch_conflict.as_deref() == Some(id.as_str()) {
                    return Ok(false);
                }
                state.batches.get_mut(id).map(|b| &mut b.quantity_remaining)
            }
            Counter::LoyaltyPoints(id) => {
                if faults.loyalty_update {
                    return Err(injected("loyalty update"));
                }
                state.customers.get_mut(id).map(|c| &mut c.loyalty_points)
            }
            Counter::Sequence(key) => Some(state.sequences.entry(key.clone()).or_insert(0)),
        };

        match slot {
            Some(value) if *value == expected => {
                *value = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn decrement_if_sufficient(&self, product_id: &str, quantity: i64) -> StoreResult<bool> {
        let mut state = self.state();
        if state.faults.stock_decrement.as_deref() == Some(product_id) {
            return Err(injected("stock decrement"));
        }
        match state.products.get_mut(product_id) {
            Some(product) if product.stock_quantity >= quantity => {
                product.stock_quantity -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl SaleStore for InMemoryStore {
    async fn insert_sale(&self, sale: &Sale) -> StoreResult<()> {
        let mut state = self.state();
        if state.sales.values().any(|s| s.receipt_number == sale.receipt_number) {
            return Err(StoreError::Unavailable(format!(
                "duplicate receipt number {}",
                sale.receipt_number
            )));
        }
        state.sales.insert(sale.id.clone(), sale.clone());
        Ok(())
    }

    async fn insert_lines(&self, items: &[SaleItem], payments: &[SalePayment]) -> StoreResult<()> {
        let mut state = self.state();
        if state.faults.lines_insert {
            return Err(injected("sale lines insert"));
        }
        state.items.extend_from_slice(items);
        state.payments.extend_from_slice(payments);
        Ok(())
    }

    async fn sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        let state = self.state();
        if state.faults.sale_read {
            return Err(injected("sale read"));
        }
        Ok(state.sales.get(id).cloned())
    }

    async fn sale_items(&self, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        Ok(self
            .state()
            .items
            .iter()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn sale_payments(&self, sale_id: &str) -> StoreResult<Vec<SalePayment>> {
        Ok(self
            .state()
            .payments
            .iter()
            .filter(|p| p.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn sales_for_shift(&self, shift_id: &str, status: SaleStatus) -> StoreResult<Vec<Sale>> {
        let mut sales: Vec<Sale> = self
            .state()
            .sales
            .values()
            .filter(|s| s.shift_id == shift_id && s.status == status)
            .cloned()
            .collect();
        sales.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sales)
    }

    async fn transition_sale(
        &self,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
        notes: Option<&str>,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        if state.faults.sale_transition {
            return Err(injected("sale status update"));
        }
        match state.sales.get_mut(id) {
            Some(sale) if sale.status == from => {
                sale.status = to;
                if let Some(notes) = notes {
                    sale.notes = Some(notes.to_string());
                }
                sale.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl MovementStore for InMemoryStore {
    async fn insert_movement(&self, movement: &StockMovement) -> StoreResult<()> {
        let mut state = self.state();
        if matches!(state.faults.movement_insert_after, Some(limit) if state.movements.len() >= limit) {
            return Err(injected("movement insert"));
        }
        state.movements.push(movement.clone());
        Ok(())
    }

    async fn delete_movement(&self, id: &str) -> StoreResult<bool> {
        let mut state = self.state();
        if state.faults.movement_delete {
            return Err(injected("movement delete"));
        }
        let before = state.movements.len();
        state.movements.retain(|m| m.id != id);
        Ok(state.movements.len() < before)
    }

    async fn movements_for(&self, reference_id: &str) -> StoreResult<Vec<StockMovement>> {
        Ok(self
            .state()
            .movements
            .iter()
            .filter(|m| m.reference_id == reference_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReturnStore for InMemoryStore {
    async fn insert_return(&self, request: &ReturnRequest, lines: &[ReturnLine]) -> StoreResult<()> {
        let mut state = self.state();
        state.returns.insert(request.id.clone(), request.clone());
        state.return_lines.extend_from_slice(lines);
        Ok(())
    }

    async fn return_request(&self, id: &str) -> StoreResult<Option<ReturnRequest>> {
        Ok(self.state().returns.get(id).cloned())
    }

    async fn return_lines(&self, return_id: &str) -> StoreResult<Vec<ReturnLine>> {
        Ok(self
            .state()
            .return_lines
            .iter()
            .filter(|l| l.return_id == return_id)
            .cloned()
            .collect())
    }

    async fn returned_quantities(&self, sale_id: &str) -> StoreResult<HashMap<String, i64>> {
        Ok(self.quantities_where(sale_id, |status| status != ReturnStatus::Rejected))
    }

    async fn completed_return_quantities(&self, sale_id: &str) -> StoreResult<HashMap<String, i64>> {
        Ok(self.quantities_where(sale_id, |status| status == ReturnStatus::Completed))
    }

    async fn pending_returns(&self, sale_id: &str) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self
            .state()
            .returns
            .values()
            .filter(|r| r.sale_id == sale_id && r.status == ReturnStatus::Pending)
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn transition_return(
        &self,
        id: &str,
        from: ReturnStatus,
        to: ReturnStatus,
        refund_amount_cents: i64,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        match state.returns.get_mut(id) {
            Some(request) if request.status == from => {
                request.status = to;
                request.refund_amount_cents = refund_amount_cents;
                request.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, stock: i64) -> Product {
        Product {
            id: id.to_string(),
            sku: format!("SKU-{}", id),
            name: format!("Product {}", id),
            price_cents: 1000,
            cost_price_cents: 600,
            tax_rate_bps: 0,
            stock_quantity: stock,
            reorder_level: 0,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_counter_cas() {
        let store = InMemoryStore::new();
        store.add_product(product("P1", 5));
        let stock = Counter::ProductStock("P1".into());

        assert!(!store.try_update(&stock, 4, 9).await.unwrap());
        assert!(store.try_update(&stock, 5, 9).await.unwrap());
        assert_eq!(store.load(&stock).await.unwrap(), Some(9));
        assert_eq!(store.load(&Counter::ProductStock("nope".into())).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sequence_starts_at_zero() {
        let store = InMemoryStore::new();
        let seq = Counter::Sequence("receipt:INV:2026".into());

        assert_eq!(store.load(&seq).await.unwrap(), Some(0));
        assert!(store.try_update(&seq, 0, 1).await.unwrap());
        assert_eq!(store.sequence_value("receipt:INV:2026"), 1);
    }

    #[tokio::test]
    async fn test_guarded_decrement_and_fault() {
        let store = InMemoryStore::new();
        store.add_product(product("P1", 1));

        assert!(store.decrement_if_sufficient("P1", 1).await.unwrap());
        assert!(!store.decrement_if_sufficient("P1", 1).await.unwrap());

        store.fail_stock_decrement_for("P1");
        assert!(store.decrement_if_sufficient("P1", 1).await.is_err());
        store.clear_faults();
        assert!(!store.decrement_if_sufficient("P1", 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_batch_conflict_fault() {
        let store = InMemoryStore::new();
        store.add_batch(ProductBatch {
            id: "B1".into(),
            product_id: "P1".into(),
            batch_number: "LOT-1".into(),
            quantity_initial: 5,
            quantity_remaining: 5,
            expiry_date: None,
            created_at: Utc::now(),
        });
        store.conflict_on_batch("B1");

        let batch = Counter::BatchRemaining("B1".into());
        assert!(!store.try_update(&batch, 5, 3).await.unwrap());
        assert_eq!(store.batch_remaining("B1"), Some(5));
    }
}

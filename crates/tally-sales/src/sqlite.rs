//! SQLite-backed [`PosStore`](crate::store::PosStore) over `tally_db`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tally_core::shift::ShiftReconciliation;
use tally_core::{
    Customer, Product, ProductBatch, Promotion, ReturnLine, ReturnRequest, ReturnStatus, Sale,
    SaleItem, SalePayment, SaleStatus, ShiftSession, StockMovement,
};
use tally_db::Database;

use crate::error::StoreResult;
use crate::store::{
    CatalogStore, Counter, CounterStore, MovementStore, ReturnStore, SaleStore, ShiftStore,
};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        SqliteStore { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl ShiftStore for SqliteStore {
    async fn open_shifts(&self, user_id: &str) -> StoreResult<Vec<ShiftSession>> {
        Ok(self.db.shifts().open_for_user(user_id).await?)
    }

    async fn shift(&self, id: &str) -> StoreResult<Option<ShiftSession>> {
        Ok(self.db.shifts().get_by_id(id).await?)
    }

    async fn close_shift_if_open(
        &self,
        id: &str,
        reconciliation: &ShiftReconciliation,
        closed_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self
            .db
            .shifts()
            .compare_and_close(id, reconciliation, closed_at)
            .await?)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn products(&self, ids: &[String]) -> StoreResult<Vec<Product>> {
        Ok(self.db.products().get_many(ids).await?)
    }

    async fn batches_for(&self, product_id: &str) -> StoreResult<Vec<ProductBatch>> {
        Ok(self.db.products().batches_for(product_id).await?)
    }

    async fn customer(&self, id: &str) -> StoreResult<Option<Customer>> {
        Ok(self.db.customers().get_by_id(id).await?)
    }

    async fn promotion(&self, code: &str) -> StoreResult<Option<Promotion>> {
        Ok(self.db.promotions().get_by_code(code).await?)
    }
}

#[async_trait]
impl CounterStore for SqliteStore {
    async fn load(&self, counter: &Counter) -> StoreResult<Option<i64>> {
        let value = match counter {
            Counter::ProductStock(id) => self.db.products().stock_quantity(id).await?,
            Counter::BatchRemaining(id) => self.db.products().batch_remaining(id).await?,
            Counter::LoyaltyPoints(id) => self.db.customers().loyalty_points(id).await?,
            Counter::Sequence(key) => Some(self.db.sequences().current(key).await?),
        };
        Ok(value)
    }

    async fn try_update(&self, counter: &Counter, expected: i64, new: i64) -> StoreResult<bool> {
        let applied = match counter {
            Counter::ProductStock(id) => self.db.products().compare_and_set_stock(id, expected, new).await?,
            Counter::BatchRemaining(id) => self.db.products().compare_and_set_batch(id, expected, new).await?,
            Counter::LoyaltyPoints(id) => {
                self.db.customers().compare_and_set_points(id, expected, new).await?
            }
            Counter::Sequence(key) => self.db.sequences().compare_and_set(key, expected, new).await?,
        };
        Ok(applied)
    }

    async fn decrement_if_sufficient(&self, product_id: &str, quantity: i64) -> StoreResult<bool> {
        Ok(self
            .db
            .products()
            .decrement_stock_if_sufficient(product_id, quantity)
            .await?)
    }
}

#[async_trait]
impl SaleStore for SqliteStore {
    async fn insert_sale(&self, sale: &Sale) -> StoreResult<()> {
        Ok(self.db.sales().insert_sale(sale).await?)
    }

    async fn insert_lines(&self, items: &[SaleItem], payments: &[SalePayment]) -> StoreResult<()> {
        Ok(self.db.sales().insert_lines(items, payments).await?)
    }

    async fn sale(&self, id: &str) -> StoreResult<Option<Sale>> {
        Ok(self.db.sales().get_by_id(id).await?)
    }

    async fn sale_items(&self, sale_id: &str) -> StoreResult<Vec<SaleItem>> {
        Ok(self.db.sales().get_items(sale_id).await?)
    }

    async fn sale_payments(&self, sale_id: &str) -> StoreResult<Vec<SalePayment>> {
        Ok(self.db.sales().get_payments(sale_id).await?)
    }

    async fn sales_for_shift(&self, shift_id: &str, status: SaleStatus) -> StoreResult<Vec<Sale>> {
        Ok(self.db.sales().list_by_shift(shift_id, status).await?)
    }

    async fn transition_sale(
        &self,
        id: &str,
        from: SaleStatus,
        to: SaleStatus,
        notes: Option<&str>,
    ) -> StoreResult<bool> {
        Ok(self.db.sales().compare_and_set_status(id, from, to, notes).await?)
    }
}

#[async_trait]
impl MovementStore for SqliteStore {
    async fn insert_movement(&self, movement: &StockMovement) -> StoreResult<()> {
        Ok(self.db.movements().insert(movement).await?)
    }

    async fn delete_movement(&self, id: &str) -> StoreResult<bool> {
        Ok(self.db.movements().delete(id).await?)
    }

    async fn movements_for(&self, reference_id: &str) -> StoreResult<Vec<StockMovement>> {
        Ok(self.db.movements().list_for_reference(reference_id).await?)
    }
}

#[async_trait]
impl ReturnStore for SqliteStore {
    async fn insert_return(&self, request: &ReturnRequest, lines: &[ReturnLine]) -> StoreResult<()> {
        Ok(self.db.returns().insert(request, lines).await?)
    }

    async fn return_request(&self, id: &str) -> StoreResult<Option<ReturnRequest>> {
        Ok(self.db.returns().get_by_id(id).await?)
    }

    async fn return_lines(&self, return_id: &str) -> StoreResult<Vec<ReturnLine>> {
        Ok(self.db.returns().lines_for(return_id).await?)
    }

    async fn returned_quantities(&self, sale_id: &str) -> StoreResult<HashMap<String, i64>> {
        let rows = self.db.returns().returned_quantities(sale_id).await?;
        Ok(rows.into_iter().collect())
    }

    async fn completed_return_quantities(&self, sale_id: &str) -> StoreResult<HashMap<String, i64>> {
        let rows = self.db.returns().completed_quantities(sale_id).await?;
        Ok(rows.into_iter().collect())
    }

    async fn pending_returns(&self, sale_id: &str) -> StoreResult<Vec<String>> {
        Ok(self.db.returns().pending_ids(sale_id).await?)
    }

    async fn transition_return(
        &self,
        id: &str,
        from: ReturnStatus,
        to: ReturnStatus,
        refund_amount_cents: i64,
    ) -> StoreResult<bool> {
        Ok(self
            .db
            .returns()
            .compare_and_set_status(id, from, to, refund_amount_cents)
            .await?)
    }
}

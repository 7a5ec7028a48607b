//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use tally_core::{Customer, Product, ProductBatch, Promotion, PromotionKind, ShiftSession, ShiftStatus};
use tally_sales::{AuditEvent, AuditSink, InMemoryStore, SaleOrchestrator, SalesConfig};

pub const CASHIER: &str = "cashier-1";
pub const SHIFT: &str = "shift-1";

pub fn product(id: &str, price_cents: i64, tax_rate_bps: u32, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: format!("SKU-{}", id),
        name: format!("Product {}", id),
        price_cents,
        cost_price_cents: price_cents / 2,
        tax_rate_bps,
        stock_quantity: stock,
        reorder_level: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn batch(id: &str, product_id: &str, quantity: i64, age_days: i64, expiry: Option<NaiveDate>) -> ProductBatch {
    ProductBatch {
        id: id.to_string(),
        product_id: product_id.to_string(),
        batch_number: format!("LOT-{}", id),
        quantity_initial: quantity,
        quantity_remaining: quantity,
        expiry_date: expiry,
        created_at: Utc::now() - Duration::days(age_days),
    }
}

pub fn customer(id: &str, points: i64) -> Customer {
    Customer {
        id: id.to_string(),
        name: format!("Customer {}", id),
        loyalty_points: points,
        created_at: Utc::now(),
    }
}

pub fn promotion(code: &str, kind: PromotionKind, value: i64) -> Promotion {
    let now = Utc::now();
    Promotion {
        code: code.to_string(),
        kind,
        value,
        min_order_value_cents: 0,
        start_date: now - Duration::days(1),
        end_date: now + Duration::days(30),
        is_active: true,
    }
}

pub fn open_shift(id: &str, user_id: &str, starting_cash_cents: i64, start_time: DateTime<Utc>) -> ShiftSession {
    ShiftSession {
        id: id.to_string(),
        user_id: user_id.to_string(),
        start_time,
        end_time: None,
        status: ShiftStatus::Open,
        starting_cash_cents,
        ending_cash_cents: None,
        cash_sales_cents: 0,
        expected_cash_cents: 0,
        difference_cents: None,
    }
}

/// A store with an open shift for [`CASHIER`].
pub fn store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.add_shift(open_shift(SHIFT, CASHIER, 10_000, Utc::now() - Duration::hours(1)));
    store
}

/// Adds a product whose stock is one batch of `stock` units.
pub fn stock_product(store: &InMemoryStore, id: &str, price_cents: i64, tax_rate_bps: u32, stock: i64) {
    store.add_product(product(id, price_cents, tax_rate_bps, stock));
    store.add_batch(batch(&format!("{}-B1", id), id, stock, 5, None));
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(AuditEvent::name).collect()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub fn engine(store: &InMemoryStore) -> (SaleOrchestrator<InMemoryStore>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let engine = SaleOrchestrator::new(Arc::new(store.clone()), SalesConfig::default())
        .with_audit(sink.clone());
    (engine, sink)
}

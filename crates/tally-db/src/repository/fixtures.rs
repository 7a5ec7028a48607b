//! Shared rows for repository tests.

use chrono::Utc;
use tally_core::{PaymentMethod, Product, Sale, SaleStatus, ShiftSession, ShiftStatus};

use crate::pool::{Database, DbConfig};

pub async fn db() -> Database {
    Database::new(DbConfig::in_memory()).await.unwrap()
}

pub fn product(id: &str, stock: i64) -> Product {
    let now = Utc::now();
    Product {
        id: id.to_string(),
        sku: format!("SKU-{}", id),
        name: format!("Product {}", id),
        price_cents: 1000,
        cost_price_cents: 600,
        tax_rate_bps: 1000,
        stock_quantity: stock,
        reorder_level: 2,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn open_shift(id: &str, user_id: &str) -> ShiftSession {
    ShiftSession {
        id: id.to_string(),
        user_id: user_id.to_string(),
        start_time: Utc::now(),
        end_time: None,
        status: ShiftStatus::Open,
        starting_cash_cents: 10_000,
        ending_cash_cents: None,
        cash_sales_cents: 0,
        expected_cash_cents: 0,
        difference_cents: None,
    }
}

pub fn sale(id: &str, shift_id: &str, receipt_number: &str) -> Sale {
    let now = Utc::now();
    Sale {
        id: id.to_string(),
        receipt_number: receipt_number.to_string(),
        cashier_id: "cashier-1".to_string(),
        shift_id: shift_id.to_string(),
        customer_id: None,
        sub_total_cents: 2000,
        tax_total_cents: 200,
        discount_total_cents: 0,
        grand_total_cents: 2200,
        payment_method: PaymentMethod::Cash,
        amount_paid_cents: 2500,
        change_given_cents: 300,
        points_redeemed: 0,
        promo_code: None,
        status: SaleStatus::Completed,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

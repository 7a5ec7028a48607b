mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use tally_core::{CartLine, MovementKind, PaymentMethod, ReturnStatus, SaleStatus};
use tally_db::{Database, DbConfig};
use tally_sales::{
    ErrorCode, MovementStore, ReturnLineRequest, SaleOrchestrator, SaleRequest, SaleStore, SalesConfig,
    SqliteStore,
};

use common::*;

async fn seeded() -> SaleOrchestrator<SqliteStore> {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    db.products().insert(&product("P1", 1000, 1000, 15)).await.unwrap();
    db.products().insert_batch(&batch("B1", "P1", 5, 10, None)).await.unwrap();
    db.products().insert_batch(&batch("B2", "P1", 10, 1, None)).await.unwrap();
    db.customers().insert(&customer("C1", 0)).await.unwrap();
    db.shifts()
        .insert(&open_shift(SHIFT, CASHIER, 10_000, Utc::now() - Duration::hours(1)))
        .await
        .unwrap();

    SaleOrchestrator::new(Arc::new(SqliteStore::new(db)), SalesConfig::default())
}

#[tokio::test]
async fn test_sale_refund_round_trip() {
    let engine = seeded().await;
    let db = engine.store().database().clone();

    let outcome = engine
        .process_sale(
            SaleRequest::new(CASHIER, vec![CartLine::new("P1", 8)], PaymentMethod::Cash, 9000)
                .with_customer("C1"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.sale.grand_total_cents, 8800);
    assert_eq!(outcome.sale.change_given_cents, 200);
    assert_eq!(db.products().get_by_id("P1").await.unwrap().unwrap().stock_quantity, 7);
    assert_eq!(db.customers().get_by_id("C1").await.unwrap().unwrap().loyalty_points, 8);

    let batches = db.products().batches_for("P1").await.unwrap();
    let remaining: Vec<(String, i64)> = batches
        .into_iter()
        .map(|b| (b.id, b.quantity_remaining))
        .collect();
    assert!(remaining.contains(&("B1".to_string(), 0)));
    assert!(remaining.contains(&("B2".to_string(), 7)));

    let stored = engine.store().sale(&outcome.sale.id).await.unwrap().unwrap();
    assert_eq!(stored.receipt_number, outcome.sale.receipt_number);
    assert_eq!(engine.store().sale_items(&stored.id).await.unwrap().len(), 1);
    assert_eq!(engine.store().sale_payments(&stored.id).await.unwrap().len(), 1);

    let item_id = outcome.items[0].id.clone();
    let returned = engine
        .return_items(&stored.id, &[ReturnLineRequest::new(&item_id, 3)], "manager-1", None)
        .await
        .unwrap();
    assert_eq!(returned.request.status, ReturnStatus::Completed);
    assert_eq!(returned.request.refund_amount_cents, 3300);

    let refund = engine.refund_sale(&stored.id, "manager-1").await.unwrap();
    assert_eq!(refund.sale.status, SaleStatus::Refunded);
    assert_eq!(db.products().get_by_id("P1").await.unwrap().unwrap().stock_quantity, 15);

    let movements = engine.store().movements_for(&stored.id).await.unwrap();
    let returned_units: i64 = movements
        .iter()
        .filter(|m| m.kind == MovementKind::Return)
        .map(|m| m.quantity_change)
        .sum();
    assert_eq!(returned_units, 5);

    let err = engine.refund_sale(&stored.id, "manager-1").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyRefunded);
}

#[tokio::test]
async fn test_sqlite_rejects_oversell() {
    let engine = seeded().await;

    let err = engine
        .process_sale(SaleRequest::new(CASHIER, vec![CartLine::new("P1", 16)], PaymentMethod::Cash, 20_000))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InsufficientStock);

    let db = engine.store().database();
    assert_eq!(db.products().get_by_id("P1").await.unwrap().unwrap().stock_quantity, 15);
}

#[tokio::test]
async fn test_sqlite_close_shift() {
    let engine = seeded().await;

    engine
        .process_sale(SaleRequest::new(CASHIER, vec![CartLine::new("P1", 1)], PaymentMethod::Cash, 2000))
        .await
        .unwrap();

    let shift = engine.close_shift(CASHIER, 11_100).await.unwrap();
    assert_eq!(shift.cash_sales_cents, 1100);
    assert_eq!(shift.expected_cash_cents, 11_100);
    assert_eq!(shift.difference_cents, Some(0));

    let err = engine.close_shift(CASHIER, 0).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NoOpenShift);
}

//! # Sale Repository
//!
//! Sale headers, line items and tender rows.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. HEADER                                                             │
//! │     └── insert_sale() → Sale { status: Completed | Draft }             │
//! │                                                                         │
//! │  2. LINES                                                              │
//! │     └── insert_lines() → SaleItem × n, SalePayment × m                 │
//! │         (one transaction: both sets land or neither does)              │
//! │                                                                         │
//! │  3a. REFUND                                                            │
//! │     └── compare_and_set_status(completed → refunded)                   │
//! │                                                                         │
//! │  3b. COMPENSATION                                                      │
//! │     └── compare_and_set_status(… → voided, notes = reason)             │
//! │         (headers are never deleted)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{Sale, SaleItem, SalePayment, SaleStatus};

const SALE_COLUMNS: &str = "id, receipt_number, cashier_id, shift_id, customer_id, \
     sub_total_cents, tax_total_cents, discount_total_cents, grand_total_cents, \
     payment_method, amount_paid_cents, change_given_cents, points_redeemed, promo_code, \
     status, notes, created_at, updated_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Sales of a shift in a given status.
    pub async fn list_by_shift(&self, shift_id: &str, status: SaleStatus) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {} FROM sales WHERE shift_id = ?1 AND status = ?2 ORDER BY created_at",
            SALE_COLUMNS
        );
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(shift_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Inserts a sale header.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - receipt number already used
    pub async fn insert_sale(&self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, receipt_number = %sale.receipt_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, receipt_number, cashier_id, shift_id, customer_id,
                sub_total_cents, tax_total_cents, discount_total_cents, grand_total_cents,
                payment_method, amount_paid_cents, change_given_cents, points_redeemed,
                promo_code, status, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(&sale.cashier_id)
        .bind(&sale.shift_id)
        .bind(&sale.customer_id)
        .bind(sale.sub_total_cents)
        .bind(sale.tax_total_cents)
        .bind(sale.discount_total_cents)
        .bind(sale.grand_total_cents)
        .bind(sale.payment_method)
        .bind(sale.amount_paid_cents)
        .bind(sale.change_given_cents)
        .bind(sale.points_redeemed)
        .bind(&sale.promo_code)
        .bind(sale.status)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts all items and payments of a sale in one transaction.
    ///
    /// ## Snapshot Pattern
    /// Product name and price are copied onto the item so the receipt
    /// survives later catalog edits.
    pub async fn insert_lines(&self, items: &[SaleItem], payments: &[SalePayment]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for item in items {
            debug!(sale_id = %item.sale_id, product_id = %item.product_id, "Adding sale item");

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, name_snapshot, quantity,
                    unit_price_cents, sub_total_cents, discount_cents, tax_amount_cents,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.sub_total_cents)
            .bind(item.discount_cents)
            .bind(item.tax_amount_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for payment in payments {
            debug!(sale_id = %payment.sale_id, amount = %payment.amount_cents, "Recording payment");

            sqlx::query(
                r#"
                INSERT INTO sale_payments (
                    id, sale_id, method, amount_cents, reference_id, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&payment.id)
            .bind(&payment.sale_id)
            .bind(payment.method)
            .bind(payment.amount_cents)
            .bind(&payment.reference_id)
            .bind(payment.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT
                id, sale_id, product_id, name_snapshot, quantity,
                unit_price_cents, sub_total_cents, discount_cents, tax_amount_cents,
                created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<SalePayment>> {
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT id, sale_id, method, amount_cents, reference_id, created_at
            FROM sale_payments
            WHERE sale_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Moves a sale from `from` to `to`, optionally replacing `notes`.
    ///
    /// Returns `false` if the sale was no longer in `from`.
    pub async fn compare_and_set_status(
        &self,
        sale_id: &str,
        from: SaleStatus,
        to: SaleStatus,
        notes: Option<&str>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = ?3,
                notes = COALESCE(?4, notes),
                updated_at = ?5
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(sale_id)
        .bind(from)
        .bind(to)
        .bind(notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(
            sale_id = %sale_id,
            from = from.as_str(),
            to = to.as_str(),
            applied = result.rows_affected() == 1,
            "Sale status transition"
        );
        Ok(result.rows_affected() == 1)
    }
}

/// Generates a new sale, item or payment ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures::{db, open_shift, product, sale};
    use tally_core::TenderMethod;

    #[tokio::test]
    async fn test_header_lines_and_status() {
        let db = db().await;
        db.products().insert(&product("p1", 5)).await.unwrap();
        db.shifts().insert(&open_shift("sh1", "cashier-1")).await.unwrap();
        db.sales().insert_sale(&sale("s1", "sh1", "INV-2026-000001")).await.unwrap();

        let now = Utc::now();
        let item = SaleItem {
            id: "i1".to_string(),
            sale_id: "s1".to_string(),
            product_id: "p1".to_string(),
            name_snapshot: "Product p1".to_string(),
            quantity: 2,
            unit_price_cents: 1000,
            sub_total_cents: 2000,
            discount_cents: 0,
            tax_amount_cents: 200,
            created_at: now,
        };
        let payment = SalePayment {
            id: "pay1".to_string(),
            sale_id: "s1".to_string(),
            method: TenderMethod::Cash,
            amount_cents: 2500,
            reference_id: None,
            created_at: now,
        };
        db.sales().insert_lines(&[item], &[payment]).await.unwrap();

        assert_eq!(db.sales().get_items("s1").await.unwrap().len(), 1);
        let payments = db.sales().get_payments("s1").await.unwrap();
        assert_eq!(payments[0].method, TenderMethod::Cash);

        let repo = db.sales();
        assert!(repo
            .compare_and_set_status("s1", SaleStatus::Completed, SaleStatus::Refunded, None)
            .await
            .unwrap());
        assert!(!repo
            .compare_and_set_status("s1", SaleStatus::Completed, SaleStatus::Refunded, None)
            .await
            .unwrap());

        let loaded = repo.get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(loaded.status, SaleStatus::Refunded);
        assert!(loaded.totals_balance());
    }

    #[tokio::test]
    async fn test_duplicate_receipt_number() {
        let db = db().await;
        db.shifts().insert(&open_shift("sh1", "cashier-1")).await.unwrap();
        db.sales().insert_sale(&sale("s1", "sh1", "INV-2026-000001")).await.unwrap();

        let err = db
            .sales()
            .insert_sale(&sale("s2", "sh1", "INV-2026-000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_void_records_reason() {
        let db = db().await;
        db.shifts().insert(&open_shift("sh1", "cashier-1")).await.unwrap();
        db.sales().insert_sale(&sale("s1", "sh1", "INV-2026-000001")).await.unwrap();

        db.sales()
            .compare_and_set_status("s1", SaleStatus::Completed, SaleStatus::Voided, Some("stock conflict"))
            .await
            .unwrap();

        let voided = db.sales().get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(voided.status, SaleStatus::Voided);
        assert_eq!(voided.notes.as_deref(), Some("stock conflict"));
        assert!(db
            .sales()
            .list_by_shift("sh1", SaleStatus::Completed)
            .await
            .unwrap()
            .is_empty());
    }
}

//! # Product Repository
//!
//! Products, their batches, and the two inventory counters.
//!
//! ## Guarded Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Inventory Counter Writes                             │
//! │                                                                         │
//! │  ❌ WRONG: read, compute, write back                                   │
//! │     SELECT stock_quantity ...; UPDATE products SET stock_quantity = 7  │
//! │     (two tills read 8, both write 7: one sale vanishes)                │
//! │                                                                         │
//! │  ✅ decrement_stock_if_sufficient                                       │
//! │     UPDATE products SET stock_quantity = stock_quantity - ?            │
//! │      WHERE id = ? AND stock_quantity >= ?                              │
//! │                                                                         │
//! │  ✅ compare-and-swap (batch remaining, stock restore)                   │
//! │     UPDATE ... SET col = :new WHERE id = ? AND col = :expected         │
//! │     rows_affected == 0  ⇒ someone else moved first                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{Product, ProductBatch};

const PRODUCT_COLUMNS: &str = "id, sku, name, price_cents, cost_price_cents, tax_rate_bps, \
     stock_quantity, reorder_level, is_active, created_at, updated_at";

const BATCH_COLUMNS: &str =
    "id, product_id, batch_number, quantity_initial, quantity_remaining, expiry_date, created_at";

/// Repository for products and product batches.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets every product whose id is in `ids`. Unknown ids are skipped.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=ids.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM products WHERE id IN ({})",
            PRODUCT_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, Product>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let products = query.fetch_all(&self.pool).await?;

        debug!(requested = ids.len(), found = products.len(), "Loaded catalog slice");
        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, price_cents, cost_price_cents, tax_rate_bps,
                stock_quantity, reorder_level, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.stock_quantity)
        .bind(product.reorder_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Stock counter
    // -------------------------------------------------------------------------

    /// Current `stock_quantity`, or `None` for an unknown product.
    pub async fn stock_quantity(&self, id: &str) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stock)
    }

    /// Decrements stock by `quantity` only if at least that much is on hand.
    ///
    /// Returns `false` (and changes nothing) when stock is short.
    pub async fn decrement_stock_if_sufficient(&self, id: &str, quantity: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - ?2, updated_at = ?3
            WHERE id = ?1 AND stock_quantity >= ?2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Sets `stock_quantity` to `new` only if it still equals `expected`.
    pub async fn compare_and_set_stock(&self, id: &str, expected: i64, new: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET stock_quantity = ?3, updated_at = ?4
            WHERE id = ?1 AND stock_quantity = ?2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // -------------------------------------------------------------------------
    // Batches
    // -------------------------------------------------------------------------

    /// Inserts a batch.
    pub async fn insert_batch(&self, batch: &ProductBatch) -> DbResult<()> {
        debug!(product_id = %batch.product_id, batch_id = %batch.id, "Inserting batch");

        sqlx::query(
            r#"
            INSERT INTO product_batches (
                id, product_id, batch_number, quantity_initial,
                quantity_remaining, expiry_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_id)
        .bind(&batch.batch_number)
        .bind(batch.quantity_initial)
        .bind(batch.quantity_remaining)
        .bind(batch.expiry_date)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Batches of a product that still hold stock, oldest first.
    pub async fn batches_for(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        let sql = format!(
            "SELECT {} FROM product_batches \
             WHERE product_id = ?1 AND quantity_remaining > 0 \
             ORDER BY created_at, id",
            BATCH_COLUMNS
        );
        let batches = sqlx::query_as::<_, ProductBatch>(&sql)
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(batches)
    }

    pub async fn get_batch(&self, batch_id: &str) -> DbResult<Option<ProductBatch>> {
        let sql = format!("SELECT {} FROM product_batches WHERE id = ?1", BATCH_COLUMNS);
        let batch = sqlx::query_as::<_, ProductBatch>(&sql)
            .bind(batch_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(batch)
    }

    /// Current `quantity_remaining`, or `None` for an unknown batch.
    pub async fn batch_remaining(&self, batch_id: &str) -> DbResult<Option<i64>> {
        let remaining: Option<i64> =
            sqlx::query_scalar("SELECT quantity_remaining FROM product_batches WHERE id = ?1")
                .bind(batch_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(remaining)
    }

    /// Sets `quantity_remaining` to `new` only if it still equals `expected`.
    pub async fn compare_and_set_batch(&self, batch_id: &str, expected: i64, new: i64) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE product_batches
            SET quantity_remaining = ?3
            WHERE id = ?1 AND quantity_remaining = ?2
            "#,
        )
        .bind(batch_id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Generates a new product or batch ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Return Repository
//!
//! Partial-return requests and their lines.
//!
//! ```text
//! pending ──► completed   (stock restored, refund amount fixed)
//!    │
//!    └──────► rejected    (compensated; lines no longer count as returned)
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::{ReturnLine, ReturnRequest, ReturnStatus};

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Inserts a request together with its lines.
    pub async fn insert(&self, request: &ReturnRequest, lines: &[ReturnLine]) -> DbResult<()> {
        debug!(return_id = %request.id, sale_id = %request.sale_id, lines = lines.len(), "Inserting return request");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO return_requests (
                id, sale_id, status, refund_amount_cents, reason,
                created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&request.id)
        .bind(&request.sale_id)
        .bind(request.status)
        .bind(request.refund_amount_cents)
        .bind(&request.reason)
        .bind(&request.created_by)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO return_lines (
                    id, return_id, sale_item_id, product_id, quantity, refund_amount_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&line.id)
            .bind(&line.return_id)
            .bind(&line.sale_item_id)
            .bind(&line.product_id)
            .bind(line.quantity)
            .bind(line.refund_amount_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ReturnRequest>> {
        let request = sqlx::query_as::<_, ReturnRequest>(
            r#"
            SELECT id, sale_id, status, refund_amount_cents, reason,
                   created_by, created_at, updated_at
            FROM return_requests
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    pub async fn lines_for(&self, return_id: &str) -> DbResult<Vec<ReturnLine>> {
        let lines = sqlx::query_as::<_, ReturnLine>(
            r#"
            SELECT id, return_id, sale_item_id, product_id, quantity, refund_amount_cents
            FROM return_lines
            WHERE return_id = ?1
            ORDER BY id
            "#,
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Quantity per sale item claimed by pending or completed returns.
    pub async fn returned_quantities(&self, sale_id: &str) -> DbResult<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT rl.sale_item_id, SUM(rl.quantity)
            FROM return_lines rl
            INNER JOIN return_requests rr ON rr.id = rl.return_id
            WHERE rr.sale_id = ?1 AND rr.status != 'rejected'
            GROUP BY rl.sale_item_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Quantity per sale item whose stock was restored by a completed return.
    pub async fn completed_quantities(&self, sale_id: &str) -> DbResult<Vec<(String, i64)>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT rl.sale_item_id, SUM(rl.quantity)
            FROM return_lines rl
            INNER JOIN return_requests rr ON rr.id = rl.return_id
            WHERE rr.sale_id = ?1 AND rr.status = 'completed'
            GROUP BY rl.sale_item_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn pending_ids(&self, sale_id: &str) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT id FROM return_requests
            WHERE sale_id = ?1 AND status = 'pending'
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    /// Finalizes a request if it is still in `from`.
    pub async fn compare_and_set_status(
        &self,
        id: &str,
        from: ReturnStatus,
        to: ReturnStatus,
        refund_amount_cents: i64,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE return_requests SET
                status = ?3,
                refund_amount_cents = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(refund_amount_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Generates a new return request or return line ID.
pub fn generate_return_id() -> String {
    Uuid::new_v4().to_string()
}

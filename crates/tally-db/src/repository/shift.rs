//! # Shift Repository
//!
//! Cashier shift sessions.
//!
//! ```text
//! open ──(compare_and_close)──► closed
//!          WHERE status = 'open'
//! ```
//!
//! Opening a shift belongs to the till's login flow; this repository
//! exposes `insert` for that flow and for tests.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tally_core::shift::ShiftReconciliation;
use tally_core::ShiftSession;

const SHIFT_COLUMNS: &str = "id, user_id, start_time, end_time, status, starting_cash_cents, \
     ending_cash_cents, cash_sales_cents, expected_cash_cents, difference_cents";

/// Repository for shift sessions.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    pub async fn insert(&self, shift: &ShiftSession) -> DbResult<()> {
        debug!(id = %shift.id, user_id = %shift.user_id, "Inserting shift");

        sqlx::query(
            r#"
            INSERT INTO shift_sessions (
                id, user_id, start_time, end_time, status, starting_cash_cents,
                ending_cash_cents, cash_sales_cents, expected_cash_cents, difference_cents
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.user_id)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.status)
        .bind(shift.starting_cash_cents)
        .bind(shift.ending_cash_cents)
        .bind(shift.cash_sales_cents)
        .bind(shift.expected_cash_cents)
        .bind(shift.difference_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ShiftSession>> {
        let sql = format!("SELECT {} FROM shift_sessions WHERE id = ?1", SHIFT_COLUMNS);
        let shift = sqlx::query_as::<_, ShiftSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(shift)
    }

    /// Open sessions for a user, oldest first.
    pub async fn open_for_user(&self, user_id: &str) -> DbResult<Vec<ShiftSession>> {
        let sql = format!(
            "SELECT {} FROM shift_sessions \
             WHERE user_id = ?1 AND status = 'open' \
             ORDER BY start_time, id",
            SHIFT_COLUMNS
        );
        let shifts = sqlx::query_as::<_, ShiftSession>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(shifts)
    }

    /// Closes an open shift with its reconciliation figures.
    ///
    /// Returns `false` if the shift was no longer open.
    pub async fn compare_and_close(
        &self,
        id: &str,
        reconciliation: &ShiftReconciliation,
        closed_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE shift_sessions SET
                status = 'closed',
                end_time = ?2,
                ending_cash_cents = ?3,
                cash_sales_cents = ?4,
                expected_cash_cents = ?5,
                difference_cents = ?6
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(id)
        .bind(closed_at)
        .bind(reconciliation.counted_cash.cents())
        .bind(reconciliation.cash_sales.cents())
        .bind(reconciliation.expected_cash.cents())
        .bind(reconciliation.difference.cents())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{db, open_shift};
    use tally_core::shift::reconcile;
    use tally_core::{Money, ShiftStatus};

    #[tokio::test]
    async fn test_close_only_once() {
        let db = db().await;
        let repo = db.shifts();
        repo.insert(&open_shift("s1", "u1")).await.unwrap();
        assert_eq!(repo.open_for_user("u1").await.unwrap().len(), 1);

        let rec = reconcile(Money::from_cents(10_000), Money::from_cents(2200), Money::from_cents(12_200));
        assert!(repo.compare_and_close("s1", &rec, Utc::now()).await.unwrap());
        assert!(!repo.compare_and_close("s1", &rec, Utc::now()).await.unwrap());

        let closed = repo.get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.expected_cash_cents, 12_200);
        assert_eq!(closed.difference_cents, Some(0));
        assert!(repo.open_for_user("u1").await.unwrap().is_empty());
    }
}

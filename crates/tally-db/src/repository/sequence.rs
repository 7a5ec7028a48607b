//! # Sequence Repository
//!
//! Named monotonic counters (receipt numbers). A counter that has never
//! been written reads as zero; the first compare-and-set from zero creates
//! it.

use sqlx::SqlitePool;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct SequenceRepository {
    pool: SqlitePool,
}

impl SequenceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SequenceRepository { pool }
    }

    /// Current value of `key`, zero if unset.
    pub async fn current(&self, key: &str) -> DbResult<i64> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM sequences WHERE key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value.unwrap_or(0))
    }

    /// Sets `key` to `new` only if it still equals `expected`.
    pub async fn compare_and_set(&self, key: &str, expected: i64, new: i64) -> DbResult<bool> {
        if expected == 0 {
            sqlx::query("INSERT INTO sequences (key, value) VALUES (?1, 0) ON CONFLICT(key) DO NOTHING")
                .bind(key)
                .execute(&self.pool)
                .await?;
        }

        let result = sqlx::query("UPDATE sequences SET value = ?3 WHERE key = ?1 AND value = ?2")
            .bind(key)
            .bind(expected)
            .bind(new)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}

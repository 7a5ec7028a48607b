//! # Stock Movement Repository
//!
//! Append-only inventory audit. Rows are deleted only when a saga
//! compensates the sale or return that wrote them.

use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tally_core::StockMovement;

#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    pub async fn insert(&self, movement: &StockMovement) -> DbResult<()> {
        debug!(
            product_id = %movement.product_id,
            batch_id = ?movement.batch_id,
            quantity_change = movement.quantity_change,
            "Recording stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, batch_id, kind, quantity_change,
                reference_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.product_id)
        .bind(&movement.batch_id)
        .bind(movement.kind)
        .bind(movement.quantity_change)
        .bind(&movement.reference_id)
        .bind(&movement.created_by)
        .bind(movement.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Deletes one movement. Returns `false` if it was already gone.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM stock_movements WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Movements written for a sale or return request.
    pub async fn list_for_reference(&self, reference_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, batch_id, kind, quantity_change,
                   reference_id, created_by, created_at
            FROM stock_movements
            WHERE reference_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(reference_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}

/// Generates a new stock movement ID.
pub fn generate_movement_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{db, product};
    use chrono::Utc;
    use tally_core::MovementKind;

    #[tokio::test]
    async fn test_insert_list_delete() {
        let db = db().await;
        db.products().insert(&product("p1", 5)).await.unwrap();

        let movement = StockMovement {
            id: "m1".to_string(),
            product_id: "p1".to_string(),
            batch_id: None,
            kind: MovementKind::Return,
            quantity_change: 2,
            reference_id: "s1".to_string(),
            created_by: "cashier-1".to_string(),
            created_at: Utc::now(),
        };
        let repo = db.movements();
        repo.insert(&movement).await.unwrap();

        let listed = repo.list_for_reference("s1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, MovementKind::Return);

        assert!(repo.delete("m1").await.unwrap());
        assert!(!repo.delete("m1").await.unwrap());
    }
}

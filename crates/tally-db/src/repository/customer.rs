//! # Customer Repository
//!
//! Customers and their loyalty balance. The balance is a shared counter:
//! two tills can earn or redeem for the same customer at once, so it is
//! only written through [`CustomerRepository::compare_and_set_points`].

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use tally_core::Customer;

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, loyalty_points, created_at FROM customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn insert(&self, customer: &Customer) -> DbResult<()> {
        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            "INSERT INTO customers (id, name, loyalty_points, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.loyalty_points)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Current balance, or `None` for an unknown customer.
    pub async fn loyalty_points(&self, id: &str) -> DbResult<Option<i64>> {
        let points: Option<i64> = sqlx::query_scalar("SELECT loyalty_points FROM customers WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(points)
    }

    /// Sets the balance to `new` only if it still equals `expected`.
    pub async fn compare_and_set_points(&self, id: &str, expected: i64, new: i64) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE customers SET loyalty_points = ?3 WHERE id = ?1 AND loyalty_points = ?2",
        )
        .bind(id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::db;
    use chrono::Utc;

    #[tokio::test]
    async fn test_points_cas() {
        let db = db().await;
        let repo = db.customers();
        repo.insert(&Customer {
            id: "c1".to_string(),
            name: "Ada".to_string(),
            loyalty_points: 40,
            created_at: Utc::now(),
        })
        .await
        .unwrap();

        assert!(repo.compare_and_set_points("c1", 40, 42).await.unwrap());
        assert!(!repo.compare_and_set_points("c1", 40, 44).await.unwrap());
        assert_eq!(repo.loyalty_points("c1").await.unwrap(), Some(42));
        assert_eq!(repo.loyalty_points("missing").await.unwrap(), None);
    }
}

//! # Promotion Repository
//!
//! Promo code lookup. Validity (window, minimum order) is decided in
//! `tally_core::promotion`; this layer only fetches the row.

use sqlx::SqlitePool;

use crate::error::DbResult;
use tally_core::Promotion;

#[derive(Debug, Clone)]
pub struct PromotionRepository {
    pool: SqlitePool,
}

impl PromotionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromotionRepository { pool }
    }

    /// Gets a promotion by code (case-sensitive).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Promotion>> {
        let promotion = sqlx::query_as::<_, Promotion>(
            r#"
            SELECT code, kind, value, min_order_value_cents, start_date, end_date, is_active
            FROM promotions
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promotion)
    }

    pub async fn insert(&self, promotion: &Promotion) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO promotions (
                code, kind, value, min_order_value_cents, start_date, end_date, is_active
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&promotion.code)
        .bind(promotion.kind)
        .bind(promotion.value)
        .bind(promotion.min_order_value_cents)
        .bind(promotion.start_date)
        .bind(promotion.end_date)
        .bind(promotion.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

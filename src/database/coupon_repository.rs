use crate::database::error::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub kind: String,
    pub amount: i64,
    pub currency: Option<String>,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Clone)]
pub struct CouponRepository {
    pool: PgPool,
}

impl CouponRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_code(&self, code: &str) -> DatabaseResult<Coupon> {
        sqlx::query_as::<_, Coupon>(
            r#"
            SELECT id, code, kind, amount, currency, max_uses, used_count,
                   expires_at, is_active
            FROM coupons WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    /// Atomic usage increment. The WHERE clause re-checks the cap so two
    /// concurrent settlements cannot push a coupon past max_uses; the
    /// caller reads rows_affected to learn whether the increment landed.
    pub async fn increment_usage_if_available(&self, coupon_id: Uuid) -> DatabaseResult<u64> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        self.increment_usage_if_available_in(&mut conn, coupon_id)
            .await
    }

    pub async fn increment_usage_if_available_in(
        &self,
        conn: &mut PgConnection,
        coupon_id: Uuid,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET used_count = used_count + 1
            WHERE id = $1
              AND is_active
              AND (max_uses IS NULL OR used_count < max_uses)
            "#,
        )
        .bind(coupon_id)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}

use crate::database::error::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub const PAYMENT_STATUS_PENDING: &str = "pending";
pub const PAYMENT_STATUS_SUCCEEDED: &str = "succeeded";
pub const PAYMENT_STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub provider: String,
    pub provider_ref: Option<String>,
    pub status: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, payment_id: Uuid) -> DatabaseResult<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, provider, provider_ref, status, metadata,
                   created_at, updated_at
            FROM payments WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    pub async fn find_by_order(&self, order_id: Uuid) -> DatabaseResult<Vec<Payment>> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, provider, provider_ref, status, metadata,
                   created_at, updated_at
            FROM payments WHERE order_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Latest pending payment for an order and provider; the manual-review
    /// and gateway-callback paths address payments this way.
    pub async fn find_pending_by_order_provider(
        &self,
        order_id: Uuid,
        provider: &str,
    ) -> DatabaseResult<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, provider, provider_ref, status, metadata,
                   created_at, updated_at
            FROM payments
            WHERE order_id = $1 AND provider = $2 AND status = 'pending'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    pub async fn find_by_provider_ref(
        &self,
        provider: &str,
        provider_ref: &str,
    ) -> DatabaseResult<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, order_id, provider, provider_ref, status, metadata,
                   created_at, updated_at
            FROM payments WHERE provider = $1 AND provider_ref = $2
            "#,
        )
        .bind(provider)
        .bind(provider_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    /// Records the provider session opened for a fresh payment: reference
    /// plus the initial metadata bag.
    pub async fn set_provider_session(
        &self,
        payment_id: Uuid,
        provider_ref: Option<&str>,
        metadata: &serde_json::Value,
    ) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET provider_ref = $2, metadata = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(provider_ref)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    /// Merges provider fields (receipt references, review notes) into the
    /// metadata bag of a still-pending payment.
    pub async fn attach_metadata(
        &self,
        payment_id: Uuid,
        patch: &serde_json::Value,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET metadata = metadata || $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .bind(patch)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    /// Settles a payment. Keeps an existing provider reference when the
    /// notification carries none, and merges rather than replaces metadata
    /// so the checkout-time discount snapshot survives.
    pub async fn mark_succeeded(
        &self,
        payment_id: Uuid,
        provider_ref: Option<&str>,
        metadata_patch: &serde_json::Value,
    ) -> DatabaseResult<u64> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        self.mark_succeeded_in(&mut conn, payment_id, provider_ref, metadata_patch)
            .await
    }

    pub async fn mark_succeeded_in(
        &self,
        conn: &mut PgConnection,
        payment_id: Uuid,
        provider_ref: Option<&str>,
        metadata_patch: &serde_json::Value,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'succeeded',
                provider_ref = COALESCE($2, provider_ref),
                metadata = metadata || $3,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'succeeded'
            "#,
        )
        .bind(payment_id)
        .bind(provider_ref)
        .bind(metadata_patch)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    pub async fn mark_failed_if_pending(&self, payment_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(payment_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}

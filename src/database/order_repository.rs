use crate::database::error::{DatabaseError, DatabaseResult};
use crate::database::payment_repository::Payment;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

pub const ORDER_STATUS_PENDING: &str = "pending";
pub const ORDER_STATUS_PAID: &str = "paid";
pub const ORDER_STATUS_FAILED: &str = "failed";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub license: String,
    pub unit_amount: i64,
    pub currency: String,
}

/// Everything needed to open an order with its single item and pending
/// payment row in one transaction.
#[derive(Debug, Clone)]
pub struct NewCheckout {
    pub account_id: Uuid,
    pub product_id: Uuid,
    pub license: String,
    pub currency: String,
    pub unit_amount: i64,
    pub total: i64,
    pub provider: String,
    pub metadata: serde_json::Value,
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the order, its item snapshot and a pending payment row
    /// atomically. A crash between these inserts must not leave an order
    /// without a payment to reconcile against.
    pub async fn create_checkout(&self, new: &NewCheckout) -> DatabaseResult<(Order, Payment)> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (account_id, amount, currency, status)
            VALUES ($1, $2, $3, 'pending')
            RETURNING id, account_id, amount, currency, status, created_at, updated_at
            "#,
        )
        .bind(new.account_id)
        .bind(new.total)
        .bind(&new.currency)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            r#"
            INSERT INTO order_items (order_id, product_id, license, unit_amount, currency)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order.id)
        .bind(new.product_id)
        .bind(&new.license)
        .bind(new.unit_amount)
        .bind(&new.currency)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (order_id, provider, status, metadata)
            VALUES ($1, $2, 'pending', $3)
            RETURNING id, order_id, provider, provider_ref, status, metadata,
                      created_at, updated_at
            "#,
        )
        .bind(order.id)
        .bind(&new.provider)
        .bind(&new.metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((order, payment))
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> DatabaseResult<Order> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        self.find_by_id_in(&mut conn, order_id).await
    }

    pub async fn find_by_id_in(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> DatabaseResult<Order> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, account_id, amount, currency, status, created_at, updated_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    pub async fn find_for_account(
        &self,
        order_id: Uuid,
        account_id: Uuid,
    ) -> DatabaseResult<Order> {
        sqlx::query_as::<_, Order>(
            r#"
            SELECT id, account_id, amount, currency, status, created_at, updated_at
            FROM orders WHERE id = $1 AND account_id = $2
            "#,
        )
        .bind(order_id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    pub async fn items(&self, order_id: Uuid) -> DatabaseResult<Vec<OrderItem>> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        self.items_in(&mut conn, order_id).await
    }

    pub async fn items_in(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> DatabaseResult<Vec<OrderItem>> {
        sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, product_id, license, unit_amount, currency
            FROM order_items WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_all(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Conditional transition to paid. The rows-affected count is the
    /// concurrency guard: exactly one caller observes 1 for a given order,
    /// every duplicate notification observes 0.
    pub async fn mark_paid_if_not_already(&self, order_id: Uuid) -> DatabaseResult<u64> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        self.mark_paid_if_not_already_in(&mut conn, order_id).await
    }

    pub async fn mark_paid_if_not_already_in(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'paid', updated_at = NOW()
            WHERE id = $1 AND status <> 'paid'
            "#,
        )
        .bind(order_id)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    /// Failure only overwrites pending; a paid order never regresses.
    pub async fn mark_failed_if_pending(&self, order_id: Uuid) -> DatabaseResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'failed', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    /// Rolls a freshly created checkout to failed when the provider call
    /// errors, so abandoned rows never look reconcilable.
    pub async fn fail_checkout(&self, order_id: Uuid, payment_id: Uuid) -> DatabaseResult<()> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "UPDATE orders SET status = 'failed', updated_at = NOW() WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }
}

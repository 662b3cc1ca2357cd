use crate::database::error::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DownloadToken {
    pub id: Uuid,
    pub account_id: Uuid,
    pub product_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub max_uses: i32,
    pub used_count: i32,
}

#[derive(Clone)]
pub struct DownloadRepository {
    pool: PgPool,
}

impl DownloadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_token(
        &self,
        account_id: Uuid,
        product_id: Uuid,
        expires_at: DateTime<Utc>,
        max_uses: i32,
    ) -> DatabaseResult<DownloadToken> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from_sqlx)?;
        self.create_token_in(&mut conn, account_id, product_id, expires_at, max_uses)
            .await
    }

    pub async fn create_token_in(
        &self,
        conn: &mut PgConnection,
        account_id: Uuid,
        product_id: Uuid,
        expires_at: DateTime<Utc>,
        max_uses: i32,
    ) -> DatabaseResult<DownloadToken> {
        sqlx::query_as::<_, DownloadToken>(
            r#"
            INSERT INTO download_tokens (account_id, product_id, expires_at, max_uses)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, product_id, expires_at, max_uses, used_count
            "#,
        )
        .bind(account_id)
        .bind(product_id)
        .bind(expires_at)
        .bind(max_uses)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// A token the account can still spend: not expired, uses remaining.
    pub async fn find_usable_token(
        &self,
        account_id: Uuid,
        product_id: Uuid,
    ) -> DatabaseResult<DownloadToken> {
        sqlx::query_as::<_, DownloadToken>(
            r#"
            SELECT id, account_id, product_id, expires_at, max_uses, used_count
            FROM download_tokens
            WHERE account_id = $1
              AND product_id = $2
              AND expires_at > NOW()
              AND used_count < max_uses
            ORDER BY expires_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    /// Spends one use and writes the access log in the same transaction.
    /// The conditional increment re-checks expiry and the use cap, so a
    /// token raced to exhaustion yields rows_affected 0 and no log row.
    pub async fn consume_token_and_log(
        &self,
        token_id: Uuid,
        account_id: Uuid,
        product_id: Uuid,
        client_ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> DatabaseResult<u64> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let result = sqlx::query(
            r#"
            UPDATE download_tokens
            SET used_count = used_count + 1
            WHERE id = $1
              AND expires_at > NOW()
              AND used_count < max_uses
            "#,
        )
        .bind(token_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(0);
        }

        sqlx::query(
            r#"
            INSERT INTO download_logs (account_id, product_id, client_ip, user_agent)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(account_id)
        .bind(product_id)
        .bind(client_ip)
        .bind(user_agent)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected())
    }
}

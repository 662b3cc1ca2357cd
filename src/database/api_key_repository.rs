use crate::database::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolves a raw key's SHA-256 hex digest to its owning account.
    /// Only the digest is ever stored or compared.
    pub async fn find_account_by_key_hash(&self, key_hash: &str) -> DatabaseResult<Uuid> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT account_id FROM api_keys WHERE key_hash = $1 AND is_active",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(|(account_id,)| account_id)
            .ok_or(DatabaseError::NotFound)
    }
}

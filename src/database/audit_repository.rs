use crate::database::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        actor: &str,
        action: &str,
        target_type: &str,
        target_id: &str,
        detail: &serde_json::Value,
    ) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (actor, action, target_type, target_id, detail)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(actor)
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(detail)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }
}

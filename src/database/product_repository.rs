use crate::database::error::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductPrice {
    pub id: Uuid,
    pub product_id: Uuid,
    pub license: String,
    pub currency: String,
    pub amount: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FileVersion {
    pub id: Uuid,
    pub product_id: Uuid,
    pub version: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ProductRepository {
    pool: PgPool,
}

impl ProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_slug(&self, slug: &str) -> DatabaseResult<Product> {
        sqlx::query_as::<_, Product>("SELECT id, slug, title FROM products WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .ok_or(DatabaseError::NotFound)
    }

    pub async fn find_active_price(
        &self,
        product_id: Uuid,
        license: &str,
        currency: &str,
    ) -> DatabaseResult<ProductPrice> {
        sqlx::query_as::<_, ProductPrice>(
            r#"
            SELECT id, product_id, license, currency, amount, is_active
            FROM product_prices
            WHERE product_id = $1 AND license = $2 AND currency = $3 AND is_active
            "#,
        )
        .bind(product_id)
        .bind(license)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }

    /// Most recently uploaded file for a product. Downloads always serve
    /// the newest version.
    pub async fn latest_file_version(&self, product_id: Uuid) -> DatabaseResult<FileVersion> {
        sqlx::query_as::<_, FileVersion>(
            r#"
            SELECT id, product_id, version, storage_key, created_at
            FROM file_versions
            WHERE product_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .ok_or(DatabaseError::NotFound)
    }
}

//! Persistence layer: pool setup plus one repository per aggregate. All SQL
//! lives here; services never touch the pool directly.

pub mod api_key_repository;
pub mod audit_repository;
pub mod coupon_repository;
pub mod download_repository;
pub mod error;
pub mod order_repository;
pub mod payment_repository;
pub mod product_repository;

pub use api_key_repository::ApiKeyRepository;
pub use audit_repository::AuditRepository;
pub use coupon_repository::CouponRepository;
pub use download_repository::DownloadRepository;
pub use error::{DatabaseError, DatabaseResult};
pub use order_repository::OrderRepository;
pub use payment_repository::PaymentRepository;
pub use product_repository::ProductRepository;

use crate::config::DatabaseConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

pub async fn init_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout));

    if let Some(idle) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle));
    }

    let pool = options.connect(&config.url).await?;
    info!(
        max_connections = config.max_connections,
        "database pool initialized"
    );
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

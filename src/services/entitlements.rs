use crate::config::DownloadConfig;
use crate::database::{CouponRepository, DownloadRepository, OrderRepository};
use crate::error::ApiResult;
use crate::payments::types::DiscountSnapshot;
use crate::services::audit::AuditRecorder;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;
use tracing::{info, warn};
use uuid::Uuid;

/// What a settlement granted, reported back after the transaction commits.
#[derive(Debug, Clone)]
pub struct GrantSummary {
    pub products: Vec<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub coupon_incremented: Option<bool>,
}

/// Grants download access once an order settles: one time-boxed, use-capped
/// token per purchased product, plus the coupon usage increment taken from
/// the discount snapshot decided at checkout time. Runs inside the
/// settlement transaction so a paid order can never commit without its
/// tokens.
#[derive(Clone)]
pub struct EntitlementService {
    orders: OrderRepository,
    downloads: DownloadRepository,
    coupons: CouponRepository,
    audit: AuditRecorder,
    token_ttl_days: i64,
    token_max_uses: i32,
}

impl EntitlementService {
    pub fn new(
        orders: OrderRepository,
        downloads: DownloadRepository,
        coupons: CouponRepository,
        audit: AuditRecorder,
        config: &DownloadConfig,
    ) -> Self {
        Self {
            orders,
            downloads,
            coupons,
            audit,
            token_ttl_days: config.token_ttl_days,
            token_max_uses: config.token_max_uses,
        }
    }

    pub async fn grant_in(
        &self,
        conn: &mut PgConnection,
        order_id: Uuid,
        account_id: Uuid,
        discount: Option<&DiscountSnapshot>,
    ) -> ApiResult<GrantSummary> {
        let items = self.orders.items_in(&mut *conn, order_id).await?;
        let expires_at = Utc::now() + Duration::days(self.token_ttl_days);

        let mut granted: Vec<Uuid> = Vec::new();
        for item in &items {
            if granted.contains(&item.product_id) {
                continue;
            }
            let token = self
                .downloads
                .create_token_in(
                    &mut *conn,
                    account_id,
                    item.product_id,
                    expires_at,
                    self.token_max_uses,
                )
                .await?;
            granted.push(item.product_id);
            info!(
                %order_id,
                product_id = %item.product_id,
                token_id = %token.id,
                "download token granted"
            );
        }

        let mut coupon_incremented = None;
        if let Some(snapshot) = discount {
            let rows = self
                .coupons
                .increment_usage_if_available_in(&mut *conn, snapshot.coupon_id)
                .await?;
            coupon_incremented = Some(rows > 0);
            if rows == 0 {
                // The coupon passed validation at checkout but raced to its
                // cap before settlement. The sale stands; only the counter
                // stays behind.
                warn!(
                    %order_id,
                    coupon_id = %snapshot.coupon_id,
                    code = %snapshot.code,
                    "coupon usage increment skipped"
                );
            }
        }

        Ok(GrantSummary {
            products: granted,
            expires_at,
            coupon_incremented,
        })
    }

    /// Audit entry for a committed grant. Called after the settlement
    /// transaction so the trail never describes rolled-back work.
    pub async fn record_granted(&self, order_id: Uuid, summary: &GrantSummary) {
        self.audit
            .record(
                "system",
                "entitlement.granted",
                "order",
                &order_id.to_string(),
                serde_json::json!({
                    "products": summary
                        .products
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>(),
                    "expires_at": summary.expires_at.to_rfc3339(),
                    "max_uses": self.token_max_uses,
                    "coupon_incremented": summary.coupon_incremented,
                }),
            )
            .await;
    }
}

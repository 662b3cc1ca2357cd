use crate::database::payment_repository::Payment;
use crate::database::{DatabaseError, OrderRepository, PaymentRepository};
use crate::error::ApiResult;
use crate::payments::types::PaymentMetadata;
use crate::services::audit::AuditRecorder;
use crate::services::entitlements::EntitlementService;
use crate::services::notify::Mailer;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

/// Settles payment notifications from every channel: card webhooks, the
/// gateway verify handshake and admin approvals all converge here. The
/// conditional order update is the only idempotency guard; whichever
/// notification flips pending to paid also grants the entitlements, and
/// every duplicate is a no-op.
#[derive(Clone)]
pub struct ReconcileService {
    pool: PgPool,
    orders: OrderRepository,
    payments: PaymentRepository,
    entitlements: EntitlementService,
    audit: AuditRecorder,
    mailer: Mailer,
}

impl ReconcileService {
    pub fn new(
        pool: PgPool,
        orders: OrderRepository,
        payments: PaymentRepository,
        entitlements: EntitlementService,
        audit: AuditRecorder,
        mailer: Mailer,
    ) -> Self {
        Self {
            pool,
            orders,
            payments,
            entitlements,
            audit,
            mailer,
        }
    }

    /// Marks a payment settled and, if this call is the one that flips the
    /// order to paid, grants entitlements and notifies the customer.
    /// Payment update, conditional order transition, token inserts and
    /// coupon increment commit or roll back as one transaction; a paid
    /// order without its tokens cannot be observed. Returns whether this
    /// call won the transition.
    pub async fn confirm_paid(
        &self,
        payment: &Payment,
        provider_ref: Option<&str>,
        metadata_patch: serde_json::Value,
        actor: &str,
    ) -> ApiResult<bool> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        self.payments
            .mark_succeeded_in(&mut tx, payment.id, provider_ref, &metadata_patch)
            .await?;

        let rows = self
            .orders
            .mark_paid_if_not_already_in(&mut tx, payment.order_id)
            .await?;
        if rows == 0 {
            tx.commit().await.map_err(DatabaseError::from_sqlx)?;
            info!(
                order_id = %payment.order_id,
                payment_id = %payment.id,
                "duplicate settlement notification ignored"
            );
            return Ok(false);
        }

        let order = self.orders.find_by_id_in(&mut tx, payment.order_id).await?;
        let discount = PaymentMetadata::from_json(&payment.metadata).and_then(|m| m.discount);

        let summary = self
            .entitlements
            .grant_in(&mut tx, order.id, order.account_id, discount.as_ref())
            .await?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        self.entitlements.record_granted(order.id, &summary).await;
        self.audit
            .record(
                actor,
                "order.paid",
                "order",
                &order.id.to_string(),
                serde_json::json!({
                    "payment_id": payment.id.to_string(),
                    "provider": payment.provider,
                    "provider_ref": provider_ref,
                }),
            )
            .await;

        self.mailer.notify_order_paid(order.account_id, order.id).await;

        info!(
            order_id = %order.id,
            payment_id = %payment.id,
            provider = %payment.provider,
            "order settled"
        );
        Ok(true)
    }

    /// Records a failed or abandoned payment. Paid orders never regress.
    pub async fn mark_failed(
        &self,
        payment_id: Uuid,
        order_id: Uuid,
        actor: &str,
        reason: &str,
    ) -> ApiResult<()> {
        self.payments.mark_failed_if_pending(payment_id).await?;
        let rows = self.orders.mark_failed_if_pending(order_id).await?;
        if rows > 0 {
            self.audit
                .record(
                    actor,
                    "order.failed",
                    "order",
                    &order_id.to_string(),
                    serde_json::json!({
                        "payment_id": payment_id.to_string(),
                        "reason": reason,
                    }),
                )
                .await;
        }
        Ok(())
    }
}

use crate::api::AppState;
use crate::database::order_repository::{Order, OrderItem};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::{AdminAuth, AuthedAccount};
use crate::payments::types::ProviderName;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment_status: Option<String>,
    pub provider: Option<String>,
}

pub async fn get_order(
    State(state): State<AppState>,
    account: AuthedAccount,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderResponse>> {
    let order = state
        .orders
        .find_for_account(id, account.account_id)
        .await
        .map_err(|err| match err {
            e if e.is_not_found() => ApiError::NotFound("Order".to_string()),
            e => e.into(),
        })?;

    let items = state.orders.items(order.id).await?;
    let payments = state.payments.find_by_order(order.id).await?;
    let latest = payments.first();

    Ok(Json(OrderResponse {
        items,
        payment_status: latest.map(|p| p.status.clone()),
        provider: latest.map(|p| p.provider.clone()),
        order,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    pub reference: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReceiptResponse {
    pub ok: bool,
}

/// Customer attaches their bank-transfer receipt details to the pending
/// manual payment. Only metadata moves; the status transition belongs to
/// the admin review.
pub async fn attach_receipt(
    State(state): State<AppState>,
    account: AuthedAccount,
    Path(id): Path<Uuid>,
    Json(body): Json<ReceiptRequest>,
) -> ApiResult<Json<ReceiptResponse>> {
    if body.reference.trim().is_empty() {
        return Err(ApiError::Validation("reference is required".to_string()));
    }

    let order = state
        .orders
        .find_for_account(id, account.account_id)
        .await
        .map_err(|err| match err {
            e if e.is_not_found() => ApiError::NotFound("Order".to_string()),
            e => e.into(),
        })?;

    let payment = state
        .payments
        .find_pending_by_order_provider(order.id, ProviderName::ManualTransfer.as_str())
        .await
        .map_err(|err| match err {
            e if e.is_not_found() => ApiError::NotFound("Pending manual payment".to_string()),
            e => e.into(),
        })?;

    let mut patch = serde_json::json!({ "reference": body.reference.trim() });
    if let Some(note) = body.note.as_deref().filter(|n| !n.trim().is_empty()) {
        patch["note"] = serde_json::json!(note.trim());
    }
    if let Some(url) = body.receipt_url.as_deref().filter(|u| !u.trim().is_empty()) {
        patch["receipt_url"] = serde_json::json!(url.trim());
    }

    let rows = state.payments.attach_metadata(payment.id, &patch).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("Pending manual payment".to_string()));
    }

    state
        .audit
        .record(
            &account.account_id.to_string(),
            "payment.receipt_attached",
            "payment",
            &payment.id.to_string(),
            patch,
        )
        .await;

    Ok(Json(ReceiptResponse { ok: true }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub action: ReviewAction,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub ok: bool,
    pub settled: bool,
}

/// Operator decision on a pending bank transfer. Approve settles the order
/// through the same reconciliation path as the automated channels.
pub async fn review_manual_payment(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Path(order_id): Path<Uuid>,
    Json(body): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewResponse>> {
    let payment = state
        .payments
        .find_pending_by_order_provider(order_id, ProviderName::ManualTransfer.as_str())
        .await
        .map_err(|err| match err {
            e if e.is_not_found() => ApiError::NotFound("Pending manual payment".to_string()),
            e => e.into(),
        })?;

    let note = body.note.as_deref().unwrap_or("").trim().to_string();

    match body.action {
        ReviewAction::Approve => {
            let patch = serde_json::json!({ "review_note": note });
            let settled = state
                .reconciler
                .confirm_paid(&payment, None, patch, "admin")
                .await?;
            Ok(Json(ReviewResponse { ok: true, settled }))
        }
        ReviewAction::Reject => {
            state
                .reconciler
                .mark_failed(payment.id, order_id, "admin", &note)
                .await?;
            Ok(Json(ReviewResponse {
                ok: true,
                settled: false,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_action_parses_lowercase() {
        let req: ReviewRequest =
            serde_json::from_value(serde_json::json!({ "action": "approve" })).unwrap();
        assert_eq!(req.action, ReviewAction::Approve);

        let req: ReviewRequest =
            serde_json::from_value(serde_json::json!({ "action": "reject", "note": "no funds" }))
                .unwrap();
        assert_eq!(req.action, ReviewAction::Reject);
        assert_eq!(req.note.as_deref(), Some("no funds"));
    }
}

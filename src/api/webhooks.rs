use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::payments::adapters::card::{EVENT_CHECKOUT_COMPLETED, EVENT_CHECKOUT_EXPIRED};
use crate::payments::adapters::CALLBACK_STATUS_OK;
use crate::payments::types::{Currency, PaymentMeta, PaymentMetadata, ProviderName};
use crate::payments::utils::verify_hmac_sha256;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

/// Notification statuses different secondary processors use to mean paid.
const PAID_STATUSES: &[&str] = &["paid", "success", "succeeded", "completed", "ok"];
const FAILED_STATUSES: &[&str] = &["failed", "failure", "cancelled", "canceled", "error", "expired"];

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn ack() -> Json<WebhookAck> {
    Json(WebhookAck { received: true })
}

/// Card processor webhook: signature-checked against the raw body, then
/// dispatched on the event type. Unknown events are acknowledged so the
/// processor stops retrying them.
pub async fn card_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers
        .get("x-card-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;
    state.adapters.card.verify_signature(&body, signature)?;

    let event = state.adapters.card.parse_event(&body)?;
    let session = &event.data.object;

    // The session metadata carries our payment id; the provider reference
    // is the fallback for sessions opened before metadata was attached.
    let payment = match session
        .metadata
        .get("payment_id")
        .and_then(|raw| Uuid::parse_str(raw).ok())
    {
        Some(payment_id) => state.payments.find_by_id(payment_id).await,
        None => {
            state
                .payments
                .find_by_provider_ref(ProviderName::Card.as_str(), &session.id)
                .await
        }
    };

    let payment = match payment {
        Ok(payment) => payment,
        Err(err) if err.is_not_found() => {
            warn!(session_id = %session.id, "card webhook for unknown payment");
            return Ok(ack());
        }
        Err(err) => return Err(err.into()),
    };

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            let patch = serde_json::json!({ "session_id": session.id });
            state
                .reconciler
                .confirm_paid(&payment, Some(&session.id), patch, "card-webhook")
                .await?;
        }
        EVENT_CHECKOUT_EXPIRED => {
            state
                .reconciler
                .mark_failed(payment.id, payment.order_id, "card-webhook", "session expired")
                .await?;
        }
        other => {
            info!(event_type = %other, "ignoring card event");
        }
    }

    Ok(ack())
}

#[derive(Debug, Deserialize)]
pub struct GatewayCallbackQuery {
    #[serde(default)]
    pub authority: Option<String>,
    pub order: Uuid,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
}

fn default_locale() -> String {
    "en".to_string()
}

fn account_redirect(frontend_url: &str, locale: &str, result: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/{}/account?payment={}&provider=regional-gateway",
        frontend_url.trim_end_matches('/'),
        locale,
        result
    ))
}

/// Landing point for the gateway's browser redirect. On a success status
/// the charge is confirmed server-to-server with the verify call before
/// anything settles; the customer ends up back on their account page
/// either way.
pub async fn gateway_callback(
    State(state): State<AppState>,
    Query(query): Query<GatewayCallbackQuery>,
) -> ApiResult<Redirect> {
    let frontend = &state.config.server.frontend_url;

    let order = match state.orders.find_by_id(query.order).await {
        Ok(order) => order,
        Err(err) if err.is_not_found() => {
            warn!(order_id = %query.order, "gateway callback for unknown order");
            return Ok(account_redirect(frontend, &query.locale, "failed"));
        }
        Err(err) => return Err(err.into()),
    };

    let payment = match state
        .payments
        .find_pending_by_order_provider(order.id, ProviderName::RegionalGateway.as_str())
        .await
    {
        Ok(payment) => payment,
        Err(err) if err.is_not_found() => {
            // Settled already, most likely a refreshed callback.
            let result = if order.status == "paid" { "success" } else { "failed" };
            return Ok(account_redirect(frontend, &query.locale, result));
        }
        Err(err) => return Err(err.into()),
    };

    if query.status.as_deref() != Some(CALLBACK_STATUS_OK) {
        state
            .reconciler
            .mark_failed(payment.id, order.id, "gateway-callback", "customer cancelled")
            .await?;
        return Ok(account_redirect(frontend, &query.locale, "cancelled"));
    }

    let Some(authority) = query.authority.as_deref().filter(|a| !a.is_empty()) else {
        state
            .reconciler
            .mark_failed(payment.id, order.id, "gateway-callback", "missing authority")
            .await?;
        return Ok(account_redirect(frontend, &query.locale, "failed"));
    };

    // Replay the exact native amount requested at checkout; recompute from
    // the order only if the metadata bag predates the session.
    let native_amount = PaymentMetadata::from_json(&payment.metadata)
        .and_then(|m| match m.meta {
            PaymentMeta::Gateway { native_amount, .. } => native_amount,
            _ => None,
        })
        .unwrap_or_else(|| {
            let currency = Currency::from_str(&order.currency).unwrap_or(Currency::Usd);
            state.config.rates.to_native(order.amount, currency)
        });

    match state.adapters.gateway.verify(authority, native_amount).await {
        Ok(verification) => {
            let patch = serde_json::json!({
                "authority": authority,
                "ref_id": verification.ref_id,
            });
            state
                .reconciler
                .confirm_paid(&payment, Some(authority), patch, "gateway-callback")
                .await?;
            Ok(account_redirect(frontend, &query.locale, "success"))
        }
        Err(err) => {
            warn!(order_id = %order.id, error = %err, "gateway verification failed");
            state
                .reconciler
                .mark_failed(payment.id, order.id, "gateway-callback", "verification failed")
                .await?;
            Ok(account_redirect(frontend, &query.locale, "failed"))
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PspNotification {
    #[serde(alias = "order_id")]
    pub order_id: Uuid,
    pub status: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Generic signed webhook for the secondary processors. The payload names
/// our order directly; the matching pending payment settles through the
/// shared reconciler.
pub async fn psp_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let secret = state
        .config
        .psp
        .webhook_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ApiError::InvalidSignature)?;

    let signature = headers
        .get("x-psp-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;
    if !verify_hmac_sha256(&body, secret, signature) {
        return Err(ApiError::InvalidSignature);
    }

    let notification: PspNotification = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("invalid webhook payload: {}", e)))?;

    let payments = state.payments.find_by_order(notification.order_id).await?;
    let Some(payment) = payments.iter().find(|p| p.status == "pending") else {
        info!(order_id = %notification.order_id, "psp webhook with no pending payment");
        return Ok(ack());
    };

    let status = notification.status.trim().to_lowercase();
    if PAID_STATUSES.contains(&status.as_str()) {
        let patch = serde_json::json!({
            "psp_status": status,
            "psp_reference": notification.reference,
        });
        state
            .reconciler
            .confirm_paid(payment, notification.reference.as_deref(), patch, "psp-webhook")
            .await?;
    } else if FAILED_STATUSES.contains(&status.as_str()) {
        state
            .reconciler
            .mark_failed(payment.id, payment.order_id, "psp-webhook", &status)
            .await?;
    } else {
        info!(order_id = %notification.order_id, %status, "ignoring psp status");
    }

    Ok(ack())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psp_notification_accepts_both_id_spellings() {
        let id = Uuid::new_v4();
        let camel: PspNotification = serde_json::from_value(serde_json::json!({
            "orderId": id.to_string(),
            "status": "PAID",
        }))
        .unwrap();
        assert_eq!(camel.order_id, id);

        let snake: PspNotification = serde_json::from_value(serde_json::json!({
            "order_id": id.to_string(),
            "status": "failed",
            "reference": "ref-1",
        }))
        .unwrap();
        assert_eq!(snake.reference.as_deref(), Some("ref-1"));
    }

    #[test]
    fn paid_status_synonyms_are_closed_sets() {
        for status in ["paid", "success", "succeeded", "completed", "ok"] {
            assert!(PAID_STATUSES.contains(&status));
        }
        assert!(!PAID_STATUSES.contains(&"pending"));
        assert!(FAILED_STATUSES.contains(&"cancelled"));
        assert!(!FAILED_STATUSES.contains(&"ok"));
    }
}

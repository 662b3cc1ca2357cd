use crate::config::CardConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::{ChargeRequest, CheckoutSession, PaymentMeta, ProviderName};
use crate::payments::utils::{hmac_sha256, secure_eq, PaymentHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Signed webhooks older than this are rejected to blunt replay.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";

/// Card processor adapter: opens a hosted checkout session and verifies the
/// processor's signed webhooks. The session metadata carries every id the
/// webhook reconciler needs, so reconciliation does not depend on a lookup
/// by provider reference alone.
pub struct CardAdapter {
    config: CardConfig,
    frontend_url: String,
    http: PaymentHttpClient,
}

#[derive(Debug, Deserialize)]
struct CardSessionCreated {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct CardEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: CardEventData,
}

#[derive(Debug, Deserialize)]
pub struct CardEventData {
    pub object: CardSession,
}

#[derive(Debug, Deserialize)]
pub struct CardSession {
    pub id: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CardAdapter {
    pub fn new(config: CardConfig, frontend_url: String) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self {
            config,
            frontend_url,
            http,
        })
    }

    fn secret_key(&self) -> PaymentResult<&str> {
        self.config
            .secret_key
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(PaymentError::NotConfigured {
                provider: "card".to_string(),
            })
    }

    /// Verifies the `t=<unix>,v1=<hex>` signature header over the raw body.
    /// Fails closed when no webhook secret is configured.
    pub fn verify_signature(&self, payload: &[u8], header: &str) -> PaymentResult<()> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(PaymentError::WebhookVerification {
                message: "webhook secret not configured".to_string(),
            })?;

        let mut timestamp: Option<i64> = None;
        let mut candidates: Vec<&str> = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(PaymentError::WebhookVerification {
            message: "missing timestamp in signature header".to_string(),
        })?;
        if candidates.is_empty() {
            return Err(PaymentError::WebhookVerification {
                message: "missing v1 signature in header".to_string(),
            });
        }

        let age = (chrono::Utc::now().timestamp() - timestamp).abs();
        if age > SIGNATURE_TOLERANCE_SECS {
            return Err(PaymentError::WebhookVerification {
                message: "signature timestamp outside tolerance".to_string(),
            });
        }

        let mut signed_payload = format!("{}.", timestamp).into_bytes();
        signed_payload.extend_from_slice(payload);
        let expected = hex::encode(hmac_sha256(secret, &signed_payload));

        if candidates
            .iter()
            .any(|candidate| secure_eq(expected.as_bytes(), candidate.trim().as_bytes()))
        {
            Ok(())
        } else {
            Err(PaymentError::WebhookVerification {
                message: "signature mismatch".to_string(),
            })
        }
    }

    pub fn parse_event(&self, payload: &[u8]) -> PaymentResult<CardEvent> {
        serde_json::from_slice(payload).map_err(|e| PaymentError::Provider {
            provider: "card".to_string(),
            message: format!("invalid webhook payload: {}", e),
            provider_code: None,
            retryable: false,
        })
    }
}

#[async_trait]
impl PaymentAdapter for CardAdapter {
    async fn create_payment(&self, request: &ChargeRequest) -> PaymentResult<CheckoutSession> {
        let secret = self.secret_key()?.to_string();
        if !self.config.currencies.contains(&request.currency) {
            return Err(PaymentError::Validation {
                message: format!(
                    "currency {} is not supported by the card network",
                    request.currency
                ),
                field: Some("currency".to_string()),
            });
        }

        let account_page = format!(
            "{}/{}/account",
            self.frontend_url.trim_end_matches('/'),
            request.locale
        );
        let mut metadata = serde_json::json!({
            "order_id": request.order_id.to_string(),
            "payment_id": request.payment_id.to_string(),
            "product_id": request.product_id.to_string(),
            "account_id": request.account_id.to_string(),
            "license": request.license.as_str(),
        });
        if let Some(coupon) = &request.coupon {
            metadata["coupon_id"] = serde_json::json!(coupon.coupon_id.to_string());
            metadata["coupon_code"] = serde_json::json!(coupon.code);
        }

        let payload = serde_json::json!({
            "amount": request.amount,
            "currency": request.currency.as_str(),
            "success_url": format!("{}?payment=success&provider=card", account_page),
            "cancel_url": format!("{}?payment=cancelled&provider=card", account_page),
            "metadata": metadata,
        });

        let session: CardSessionCreated = self
            .http
            .post_json(
                &format!(
                    "{}/v1/checkout/sessions",
                    self.config.base_url.trim_end_matches('/')
                ),
                Some(&secret),
                &payload,
            )
            .await?;

        info!(
            order_id = %request.order_id,
            session_id = %session.id,
            "card checkout session created"
        );

        Ok(CheckoutSession {
            provider_ref: Some(session.id.clone()),
            redirect_url: session.url.clone(),
            meta: PaymentMeta::Card {
                session_id: Some(session.id),
                checkout_url: Some(session.url),
            },
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Card
    }
}

use crate::config::{GatewayConfig, RateTable};
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::{ChargeRequest, CheckoutSession, Currency, PaymentMeta, ProviderName};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// The gateway appends `Status=OK` to the callback query on success;
/// anything else means the customer abandoned or the payment failed.
pub const CALLBACK_STATUS_OK: &str = "OK";

const CODE_VERIFIED: i64 = 100;
const CODE_ALREADY_VERIFIED: i64 = 101;

/// Regional gateway adapter. The flow is redirect-based: we request an
/// authority token, send the customer to the gateway's payment page, and
/// when the gateway redirects back we call verify with the same amount in
/// the gateway's native minor unit. Mock mode synthesizes authorities
/// locally so the whole handshake can run without gateway credentials.
pub struct GatewayAdapter {
    config: GatewayConfig,
    rates: RateTable,
    http: PaymentHttpClient,
}

#[derive(Debug, Deserialize)]
struct GatewayEnvelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PaymentRequestData {
    code: i64,
    authority: String,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    code: i64,
    ref_id: Option<serde_json::Value>,
}

/// Outcome of the post-redirect verify call. `already_verified` covers the
/// gateway retrying a callback it has already settled; both variants mean
/// the money moved.
#[derive(Debug, Clone)]
pub struct GatewayVerification {
    pub ref_id: Option<String>,
    pub already_verified: bool,
}

impl GatewayAdapter {
    pub fn new(config: GatewayConfig, rates: RateTable) -> PaymentResult<Self> {
        let http =
            PaymentHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self {
            config,
            rates,
            http,
        })
    }

    pub fn is_mock(&self) -> bool {
        self.config.mock_mode
    }

    /// Charge amount in the gateway's native minor unit, from the fixed
    /// rate table. The same value must be replayed on verify.
    pub fn native_amount(&self, amount: i64, currency: Currency) -> i64 {
        self.rates.to_native(amount, currency)
    }

    pub fn mock_authority(order_id: Uuid) -> String {
        format!("MOCK-{}", order_id.simple())
    }

    fn merchant_id(&self) -> PaymentResult<&str> {
        self.config
            .merchant_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(PaymentError::NotConfigured {
                provider: "regional-gateway".to_string(),
            })
    }

    fn callback_url(&self, order_id: Uuid, locale: &str) -> String {
        format!(
            "{}/payments/gateway/callback?order={}&locale={}",
            self.config.callback_base_url.trim_end_matches('/'),
            order_id,
            locale
        )
    }

    /// Confirms a payment after the gateway redirected the customer back.
    /// `native_amount` must match what was requested, otherwise the gateway
    /// rejects the verification.
    pub async fn verify(
        &self,
        authority: &str,
        native_amount: i64,
    ) -> PaymentResult<GatewayVerification> {
        if self.config.mock_mode {
            if !authority.starts_with("MOCK-") {
                return Err(PaymentError::Provider {
                    provider: "regional-gateway".to_string(),
                    message: format!("unknown mock authority: {}", authority),
                    provider_code: None,
                    retryable: false,
                });
            }
            return Ok(GatewayVerification {
                ref_id: Some(format!("MOCKREF-{}", authority.trim_start_matches("MOCK-"))),
                already_verified: false,
            });
        }

        let merchant_id = self.merchant_id()?.to_string();
        let payload = serde_json::json!({
            "merchant_id": merchant_id,
            "authority": authority,
            "amount": native_amount,
        });

        let envelope: GatewayEnvelope<VerifyData> = self
            .http
            .post_json(
                &format!(
                    "{}/api/v4/payment/verify",
                    self.config.base_url.trim_end_matches('/')
                ),
                None,
                &payload,
            )
            .await?;

        let data = envelope.data.ok_or_else(|| PaymentError::Provider {
            provider: "regional-gateway".to_string(),
            message: format!("verify rejected: {}", envelope.errors),
            provider_code: None,
            retryable: false,
        })?;

        match data.code {
            CODE_VERIFIED | CODE_ALREADY_VERIFIED => Ok(GatewayVerification {
                ref_id: data.ref_id.map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
                already_verified: data.code == CODE_ALREADY_VERIFIED,
            }),
            code => Err(PaymentError::Provider {
                provider: "regional-gateway".to_string(),
                message: format!("verification failed with code {}", code),
                provider_code: Some(code.to_string()),
                retryable: false,
            }),
        }
    }
}

#[async_trait]
impl PaymentAdapter for GatewayAdapter {
    async fn create_payment(&self, request: &ChargeRequest) -> PaymentResult<CheckoutSession> {
        let native_amount = self.native_amount(request.amount, request.currency);

        if self.config.mock_mode {
            let authority = Self::mock_authority(request.order_id);
            // Skip the payment page entirely: send the customer straight to
            // our own callback with a success status.
            let redirect_url = format!(
                "{}&authority={}&Status={}",
                self.callback_url(request.order_id, &request.locale),
                authority,
                CALLBACK_STATUS_OK
            );
            info!(order_id = %request.order_id, %authority, "mock gateway session created");
            return Ok(CheckoutSession {
                provider_ref: Some(authority.clone()),
                redirect_url,
                meta: PaymentMeta::Gateway {
                    authority: Some(authority),
                    native_amount: Some(native_amount),
                    ref_id: None,
                    locale: Some(request.locale.clone()),
                },
            });
        }

        let merchant_id = self.merchant_id()?.to_string();
        let payload = serde_json::json!({
            "merchant_id": merchant_id,
            "amount": native_amount,
            "callback_url": self.callback_url(request.order_id, &request.locale),
            "description": format!("order {}", request.order_id),
        });

        let envelope: GatewayEnvelope<PaymentRequestData> = self
            .http
            .post_json(
                &format!(
                    "{}/api/v4/payment/request",
                    self.config.base_url.trim_end_matches('/')
                ),
                None,
                &payload,
            )
            .await?;

        let data = envelope.data.ok_or_else(|| PaymentError::Provider {
            provider: "regional-gateway".to_string(),
            message: format!("payment request rejected: {}", envelope.errors),
            provider_code: None,
            retryable: false,
        })?;
        if data.code != CODE_VERIFIED {
            return Err(PaymentError::Provider {
                provider: "regional-gateway".to_string(),
                message: format!("payment request failed with code {}", data.code),
                provider_code: Some(data.code.to_string()),
                retryable: false,
            });
        }

        info!(
            order_id = %request.order_id,
            authority = %data.authority,
            native_amount,
            "gateway payment requested"
        );

        Ok(CheckoutSession {
            provider_ref: Some(data.authority.clone()),
            redirect_url: format!(
                "{}/start/{}",
                self.config.base_url.trim_end_matches('/'),
                data.authority
            ),
            meta: PaymentMeta::Gateway {
                authority: Some(data.authority),
                native_amount: Some(native_amount),
                ref_id: None,
                locale: Some(request.locale.clone()),
            },
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::RegionalGateway
    }
}

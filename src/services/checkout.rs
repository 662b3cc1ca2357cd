use crate::config::{ProviderPolicy, RateTable};
use crate::database::order_repository::{NewCheckout, Order};
use crate::database::{CouponRepository, OrderRepository, PaymentRepository, ProductRepository};
use crate::error::{ApiError, ApiResult};
use crate::payments::types::{
    ChargeRequest, Currency, LicenseType, PaymentMeta, PaymentMetadata, ProviderName,
};
use crate::payments::AdapterRegistry;
use crate::services::audit::AuditRecorder;
use crate::services::pricing::{resolve_quote, Quote};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

/// Checkout request after wire-level parsing.
#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub account_id: Uuid,
    pub product_slug: String,
    pub license: LicenseType,
    pub currency: Currency,
    pub provider: ProviderName,
    pub coupon_code: Option<String>,
    pub country: String,
    pub locale: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub payment_id: Uuid,
    pub quote: Quote,
    pub redirect_url: String,
}

/// Orchestrates a checkout end to end: price resolution, provider policy,
/// the pending order/payment rows, and the provider session. A provider
/// failure rolls the fresh rows to failed so nothing half-open survives.
#[derive(Clone)]
pub struct CheckoutService {
    products: ProductRepository,
    coupons: CouponRepository,
    orders: OrderRepository,
    payments: PaymentRepository,
    adapters: AdapterRegistry,
    policy: ProviderPolicy,
    card_currencies: Vec<Currency>,
    rates: RateTable,
    audit: AuditRecorder,
}

impl CheckoutService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        products: ProductRepository,
        coupons: CouponRepository,
        orders: OrderRepository,
        payments: PaymentRepository,
        adapters: AdapterRegistry,
        policy: ProviderPolicy,
        card_currencies: Vec<Currency>,
        rates: RateTable,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            products,
            coupons,
            orders,
            payments,
            adapters,
            policy,
            card_currencies,
            rates,
            audit,
        }
    }

    /// Providers available for a (country, currency) pair. Card requires a
    /// currency the card network supports; the regional channels are
    /// country-gated.
    pub fn allowed_providers(
        policy: &ProviderPolicy,
        card_currencies: &[Currency],
        country: &str,
        currency: Currency,
    ) -> Vec<ProviderName> {
        let country = country.trim().to_uppercase();
        let mut providers = Vec::new();
        if card_currencies.contains(&currency) {
            providers.push(ProviderName::Card);
        }
        if policy.gateway_countries.contains(&country) {
            providers.push(ProviderName::RegionalGateway);
        }
        if policy.bank_transfer_countries.contains(&country) {
            providers.push(ProviderName::ManualTransfer);
        }
        providers
    }

    pub async fn create(&self, input: CheckoutInput) -> ApiResult<CheckoutOutcome> {
        let product = self
            .products
            .find_by_slug(&input.product_slug)
            .await
            .map_err(|err| match err {
                e if e.is_not_found() => ApiError::NotFound("Product".to_string()),
                e => e.into(),
            })?;

        let price = self
            .products
            .find_active_price(product.id, input.license.as_str(), input.currency.as_str())
            .await
            .map_err(|err| match err {
                e if e.is_not_found() => ApiError::LicenseUnavailable,
                e => e.into(),
            })?;

        // Policy gate before any rows exist: a disallowed provider must
        // leave nothing behind to reconcile.
        let allowed = Self::allowed_providers(
            &self.policy,
            &self.card_currencies,
            &input.country,
            input.currency,
        );
        if !allowed.contains(&input.provider) {
            return Err(ApiError::ProviderNotAllowed);
        }

        let coupon = match &input.coupon_code {
            Some(code) => Some(self.coupons.find_by_code(code.trim()).await.map_err(
                |err| match err {
                    e if e.is_not_found() => ApiError::CouponInvalid,
                    e => e.into(),
                },
            )?),
            None => None,
        };

        let (quote, discount) = resolve_quote(
            price.amount,
            input.currency,
            coupon.as_ref(),
            &self.rates,
            Utc::now(),
        )?;

        // Initial metadata bag: provider tag plus the discount snapshot.
        // Session correlation fields are filled in after the adapter call.
        let initial_meta = PaymentMetadata {
            meta: empty_meta(input.provider),
            discount: discount.clone(),
        };

        let (order, payment) = self
            .orders
            .create_checkout(&NewCheckout {
                account_id: input.account_id,
                product_id: product.id,
                license: input.license.as_str().to_string(),
                currency: input.currency.as_str().to_string(),
                unit_amount: price.amount,
                total: quote.total,
                provider: input.provider.as_str().to_string(),
                metadata: initial_meta.to_json(),
            })
            .await?;

        let charge = ChargeRequest {
            order_id: order.id,
            payment_id: payment.id,
            account_id: input.account_id,
            product_id: product.id,
            license: input.license,
            amount: quote.total,
            currency: input.currency,
            coupon: discount.clone(),
            locale: input.locale.clone(),
        };

        let session = match self.adapters.get(input.provider).create_payment(&charge).await {
            Ok(session) => session,
            Err(err) => {
                warn!(
                    order_id = %order.id,
                    provider = %input.provider,
                    error = %err,
                    "provider session failed, rolling checkout to failed"
                );
                self.orders.fail_checkout(order.id, payment.id).await?;
                self.audit
                    .record(
                        &input.account_id.to_string(),
                        "checkout.provider_failed",
                        "order",
                        &order.id.to_string(),
                        serde_json::json!({ "provider": input.provider.as_str() }),
                    )
                    .await;
                return Err(err.into());
            }
        };

        let full_metadata = PaymentMetadata {
            meta: session.meta.clone(),
            discount,
        };
        self.payments
            .set_provider_session(
                payment.id,
                session.provider_ref.as_deref(),
                &full_metadata.to_json(),
            )
            .await?;

        self.audit
            .record(
                &input.account_id.to_string(),
                "checkout.created",
                "order",
                &order.id.to_string(),
                serde_json::json!({
                    "provider": input.provider.as_str(),
                    "product": input.product_slug,
                    "license": input.license.as_str(),
                    "subtotal": quote.subtotal,
                    "discount": quote.discount,
                    "total": quote.total,
                    "currency": input.currency.as_str(),
                }),
            )
            .await;

        info!(
            order_id = %order.id,
            provider = %input.provider,
            total = quote.total,
            "checkout created"
        );

        Ok(CheckoutOutcome {
            order,
            payment_id: payment.id,
            quote,
            redirect_url: session.redirect_url,
        })
    }
}

fn empty_meta(provider: ProviderName) -> PaymentMeta {
    match provider {
        ProviderName::Card => PaymentMeta::Card {
            session_id: None,
            checkout_url: None,
        },
        ProviderName::RegionalGateway => PaymentMeta::Gateway {
            authority: None,
            native_amount: None,
            ref_id: None,
            locale: None,
        },
        ProviderName::ManualTransfer => PaymentMeta::Manual {
            reference: None,
            note: None,
            receipt_url: None,
            review_note: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ProviderPolicy {
        ProviderPolicy {
            gateway_countries: vec!["TR".to_string()],
            bank_transfer_countries: vec!["EG".to_string()],
        }
    }

    fn card_currencies() -> Vec<Currency> {
        vec![Currency::Usd, Currency::Eur]
    }

    #[test]
    fn card_is_available_in_supported_currencies() {
        let providers =
            CheckoutService::allowed_providers(&policy(), &card_currencies(), "US", Currency::Usd);
        assert_eq!(providers, vec![ProviderName::Card]);
    }

    #[test]
    fn card_is_gated_by_currency() {
        let providers =
            CheckoutService::allowed_providers(&policy(), &[Currency::Usd], "TR", Currency::Eur);
        assert!(!providers.contains(&ProviderName::Card));
        assert!(providers.contains(&ProviderName::RegionalGateway));
    }

    #[test]
    fn gateway_is_gated_by_country() {
        let providers =
            CheckoutService::allowed_providers(&policy(), &card_currencies(), "tr", Currency::Usd);
        assert!(providers.contains(&ProviderName::RegionalGateway));
        assert!(!providers.contains(&ProviderName::ManualTransfer));
    }

    #[test]
    fn bank_transfer_is_gated_by_country() {
        let providers =
            CheckoutService::allowed_providers(&policy(), &card_currencies(), "EG", Currency::Eur);
        assert!(providers.contains(&ProviderName::ManualTransfer));
        assert!(!providers.contains(&ProviderName::RegionalGateway));
    }
}

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AuthedAccount;
use crate::payments::types::{Currency, LicenseType, ProviderName};
use crate::services::CheckoutInput;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub product: String,
    pub license: String,
    pub currency: String,
    pub provider: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    pub country: String,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "en".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub ok: bool,
    pub order_id: Uuid,
    pub redirect_url: String,
    pub message: String,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub currency: String,
}

fn checkout_message(provider: ProviderName) -> String {
    match provider {
        ProviderName::ManualTransfer => {
            "Awaiting bank transfer. Follow the instructions to complete your order.".to_string()
        }
        ProviderName::Card | ProviderName::RegionalGateway => {
            "Continue to the payment page to complete your order.".to_string()
        }
    }
}

pub async fn create_checkout(
    State(state): State<AppState>,
    account: AuthedAccount,
    Json(body): Json<CheckoutRequest>,
) -> ApiResult<Json<CheckoutResponse>> {
    if body.product.trim().is_empty() {
        return Err(ApiError::Validation("product is required".to_string()));
    }
    let license = LicenseType::from_str(&body.license)?;
    let currency = Currency::from_str(&body.currency)?;
    let provider = ProviderName::from_str(&body.provider)?;

    let country = body.country.trim().to_uppercase();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::Validation(
            "country must be a two-letter code".to_string(),
        ));
    }

    let outcome = state
        .checkout
        .create(CheckoutInput {
            account_id: account.account_id,
            product_slug: body.product.trim().to_string(),
            license,
            currency,
            provider,
            coupon_code: body.coupon_code.filter(|c| !c.trim().is_empty()),
            country,
            locale: body.locale,
        })
        .await?;

    Ok(Json(CheckoutResponse {
        ok: true,
        order_id: outcome.order.id,
        redirect_url: outcome.redirect_url,
        message: checkout_message(provider),
        subtotal: outcome.quote.subtotal,
        discount: outcome.quote.discount,
        total: outcome.quote.total,
        currency: currency.as_str().to_string(),
    }))
}

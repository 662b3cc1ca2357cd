use crate::payments::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ProviderName {
    #[serde(rename = "card")]
    Card,
    #[serde(rename = "regional-gateway")]
    RegionalGateway,
    #[serde(rename = "manual-transfer")]
    ManualTransfer,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Card => "card",
            ProviderName::RegionalGateway => "regional-gateway",
            ProviderName::ManualTransfer => "manual-transfer",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" => Ok(ProviderName::Card),
            "regional-gateway" | "gateway" => Ok(ProviderName::RegionalGateway),
            "manual-transfer" | "bank-transfer" => Ok(ProviderName::ManualTransfer),
            _ => Err(PaymentError::Validation {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

/// Closed set of checkout currencies. Prices and coupon amounts are whole
/// currency units, never fractional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            _ => Err(PaymentError::Validation {
                message: format!("unsupported currency: {}", value),
                field: Some("currency".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Personal,
    Commercial,
}

impl LicenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::Personal => "personal",
            LicenseType::Commercial => "commercial",
        }
    }
}

impl FromStr for LicenseType {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "personal" => Ok(LicenseType::Personal),
            "commercial" => Ok(LicenseType::Commercial),
            _ => Err(PaymentError::Validation {
                message: format!("unsupported license type: {}", value),
                field: Some("licenseType".to_string()),
            }),
        }
    }
}

/// Snapshot of the discount decided at checkout time. Persisted on the
/// payment so reconciliation never recomputes coupon math.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountSnapshot {
    pub coupon_id: Uuid,
    pub code: String,
    pub kind: CouponKind,
    /// Raw coupon value: a percentage for percent coupons, a whole-unit
    /// amount in `currency` for fixed coupons.
    pub amount: i64,
    pub currency: Option<Currency>,
    /// Computed discount in the checkout currency.
    pub discount: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CouponKind {
    Percent,
    Fixed,
}

/// Provider-specific correlation data stored in the payment metadata bag.
/// Tagged so the reconciler branches exhaustively instead of probing an
/// untyped map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider")]
pub enum PaymentMeta {
    #[serde(rename = "card")]
    Card {
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        checkout_url: Option<String>,
    },
    #[serde(rename = "regional-gateway")]
    Gateway {
        #[serde(skip_serializing_if = "Option::is_none")]
        authority: Option<String>,
        /// Charge amount pre-converted to the gateway's native minor unit.
        #[serde(skip_serializing_if = "Option::is_none")]
        native_amount: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ref_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        locale: Option<String>,
    },
    #[serde(rename = "manual-transfer")]
    Manual {
        #[serde(skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        receipt_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        review_note: Option<String>,
    },
}

impl PaymentMeta {
    pub fn provider(&self) -> ProviderName {
        match self {
            PaymentMeta::Card { .. } => ProviderName::Card,
            PaymentMeta::Gateway { .. } => ProviderName::RegionalGateway,
            PaymentMeta::Manual { .. } => ProviderName::ManualTransfer,
        }
    }
}

/// Full metadata bag persisted as JSONB on a payment row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(flatten)]
    pub meta: PaymentMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<DiscountSnapshot>,
}

impl PaymentMetadata {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Input handed to an adapter when the orchestrator asks it to open a
/// pending payment intent.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: Uuid,
    pub payment_id: Uuid,
    pub account_id: Uuid,
    pub product_id: Uuid,
    pub license: LicenseType,
    pub amount: i64,
    pub currency: Currency,
    pub coupon: Option<DiscountSnapshot>,
    pub locale: String,
}

/// Adapter output: where to send the customer, and how to correlate the
/// provider's later notification back to our payment row.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub provider_ref: Option<String>,
    pub redirect_url: String,
    pub meta: PaymentMeta,
}

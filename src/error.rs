use crate::database::DatabaseError;
use crate::middleware::error::ErrorResponse;
use crate::middleware::request_id;
use crate::payments::PaymentError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level error taxonomy. Every handler failure funnels through
/// here so the wire shape and status mapping stay uniform.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("License not available")]
    LicenseUnavailable,

    #[error("Provider not allowed for this checkout")]
    ProviderNotAllowed,

    #[error("Coupon is not valid")]
    CouponInvalid,

    #[error("Coupon has expired")]
    CouponExpired,

    #[error("Coupon usage limit reached")]
    CouponExhausted,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("No download entitlement")]
    NoEntitlement,

    #[error("No downloadable file for this product")]
    NoFileVersion,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::LicenseUnavailable => StatusCode::BAD_REQUEST,
            ApiError::ProviderNotAllowed => StatusCode::BAD_REQUEST,
            ApiError::CouponInvalid => StatusCode::BAD_REQUEST,
            ApiError::CouponExpired => StatusCode::BAD_REQUEST,
            ApiError::CouponExhausted => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature => StatusCode::UNAUTHORIZED,
            ApiError::Provider(_) => StatusCode::BAD_GATEWAY,
            ApiError::NoEntitlement => StatusCode::FORBIDDEN,
            ApiError::NoFileVersion => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::LicenseUnavailable => "LICENSE_UNAVAILABLE",
            ApiError::ProviderNotAllowed => "PROVIDER_NOT_ALLOWED",
            ApiError::CouponInvalid => "COUPON_INVALID",
            ApiError::CouponExpired => "COUPON_EXPIRED",
            ApiError::CouponExhausted => "COUPON_EXHAUSTED",
            ApiError::InvalidSignature => "INVALID_SIGNATURE",
            ApiError::Provider(_) => "PROVIDER_ERROR",
            ApiError::NoEntitlement => "NO_ENTITLEMENT",
            ApiError::NoFileVersion => "NO_FILE_VERSION",
            ApiError::Database(_) => "INTERNAL_ERROR",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a customer. Internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(message) => message.clone(),
            ApiError::Unauthorized => "Authentication required".to_string(),
            ApiError::NotFound(what) => format!("{} not found", what),
            ApiError::LicenseUnavailable => {
                "This license is not available in the selected currency".to_string()
            }
            ApiError::ProviderNotAllowed => {
                "This payment method is not available for your region".to_string()
            }
            ApiError::CouponInvalid => "This coupon code is not valid".to_string(),
            ApiError::CouponExpired => "This coupon code has expired".to_string(),
            ApiError::CouponExhausted => {
                "This coupon code has reached its usage limit".to_string()
            }
            ApiError::InvalidSignature => "Invalid signature".to_string(),
            ApiError::Provider(_) => "The payment provider returned an error".to_string(),
            ApiError::NoEntitlement => "No active download entitlement".to_string(),
            ApiError::NoFileVersion => "No downloadable file is available".to_string(),
            ApiError::Database(_) | ApiError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation { message, .. } => ApiError::Validation(message),
            PaymentError::WebhookVerification { .. } => ApiError::InvalidSignature,
            PaymentError::NotConfigured { provider } => {
                ApiError::Internal(format!("provider {} is not configured", provider))
            }
            PaymentError::Network { message } => ApiError::Provider(message),
            PaymentError::Provider { message, .. } => ApiError::Provider(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let mut body = ErrorResponse::new(self.error_code(), self.user_message());
        if let Some(id) = request_id::current_request_id() {
            body = body.with_request_id(id);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_classes() {
        assert_eq!(ApiError::CouponExpired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidSignature.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NoEntitlement.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::Provider("down".to_string()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_never_reaches_user_message() {
        let err = ApiError::Internal("connection pool exhausted".to_string());
        assert!(!err.user_message().contains("pool"));
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn error_body_carries_the_request_id_in_scope() {
        let response = request_id::scope(Some("req-77".to_string()), async {
            ApiError::NotFound("order".to_string()).into_response()
        })
        .await;
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "NOT_FOUND");
        assert_eq!(json["request_id"], "req-77");
    }

    #[tokio::test]
    async fn error_body_omits_request_id_outside_a_request() {
        let response = ApiError::CouponInvalid.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn payment_errors_map_onto_api_errors() {
        let err: ApiError = PaymentError::WebhookVerification {
            message: "bad".to_string(),
        }
        .into();
        assert!(matches!(err, ApiError::InvalidSignature));

        let err: ApiError = PaymentError::NotConfigured {
            provider: "card".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

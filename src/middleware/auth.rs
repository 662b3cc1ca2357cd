use crate::api::AppState;
use crate::error::ApiError;
use crate::payments::utils::secure_eq;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Authenticated storefront account. Identity arrives either as a trusted
/// `x-account-id` header set by the upstream auth proxy, or as an API key
/// (`x-api-key` or bearer token) resolved against its stored hash.
#[derive(Debug, Clone, Copy)]
pub struct AuthedAccount {
    pub account_id: Uuid,
}

pub fn hash_api_key(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

impl FromRequestParts<AppState> for AuthedAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get("x-account-id") {
            let raw = value.to_str().map_err(|_| ApiError::Unauthorized)?;
            let account_id = Uuid::parse_str(raw).map_err(|_| ApiError::Unauthorized)?;
            return Ok(AuthedAccount { account_id });
        }

        let raw_key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .or_else(|| bearer_token(parts))
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let account_id = state
            .api_keys
            .find_account_by_key_hash(&hash_api_key(raw_key))
            .await
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(AuthedAccount { account_id })
    }
}

/// Operator identity for the manual-review endpoint. A shared token is
/// compared in constant time; the route is dead when no token is set.
#[derive(Debug, Clone, Copy)]
pub struct AdminAuth;

impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .admin_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        let presented = parts
            .headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        if secure_eq(expected.as_bytes(), presented.as_bytes()) {
            Ok(AdminAuth)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AuthedAccount;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub product_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub ok: bool,
    pub url: String,
    pub version: String,
    pub expires_in_seconds: u64,
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn issue_download(
    State(state): State<AppState>,
    account: AuthedAccount,
    headers: HeaderMap,
    Json(body): Json<DownloadRequest>,
) -> ApiResult<Json<DownloadResponse>> {
    let ip = client_ip(&headers);
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let issued = state
        .downloads
        .issue(
            account.account_id,
            body.product_id,
            ip.as_deref(),
            user_agent.as_deref(),
        )
        .await?;

    Ok(Json(DownloadResponse {
        ok: true,
        url: issued.url,
        version: issued.version,
        expires_in_seconds: issued.expires_in_secs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SignedLinkQuery {
    pub expires: i64,
    pub sig: String,
}

/// Validation half of the signed download URL: the edge (or an operator
/// checking a customer report) can confirm a link before serving bytes.
/// Succeeds with no body; a bad or expired signature is unauthorized.
pub async fn verify_signed_link(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedLinkQuery>,
) -> ApiResult<StatusCode> {
    if state.signer.verify(&key, query.expires, &query.sig) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn client_ip_is_none_without_header() {
        assert!(client_ip(&HeaderMap::new()).is_none());
    }
}

use crate::payments::error::{PaymentError, PaymentResult};
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Thin retrying HTTP client shared by the payment adapters. Providers
/// retry webhooks that time out, so every outbound call is bounded.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl PaymentHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        body: &JsonValue,
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self
                .client
                .post(url)
                .timeout(self.timeout)
                .header("Content-Type", "application/json")
                .json(body);
            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }

            let response = request.send().await.map_err(|e| PaymentError::Network {
                message: format!("provider request failed: {}", e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::Provider {
                                provider: "http".to_string(),
                                message: format!("invalid provider JSON response: {}", e),
                                provider_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if (status.is_server_error() || status.as_u16() == 429)
                        && attempt < self.max_retries
                    {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "provider error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::Provider {
                        provider: "http".to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::Network {
            message: "provider request failed".to_string(),
        }))
    }
}

pub fn hmac_sha256(secret: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Verifies an HMAC-SHA256 signature over the raw body. Accepts hex or
/// base64 digests and an optional `sha256=` prefix; the comparison is
/// constant time in both encodings.
pub fn verify_hmac_sha256(payload: &[u8], secret: &str, signature: &str) -> bool {
    let presented = signature.trim().trim_start_matches("sha256=").trim();
    if presented.is_empty() {
        return false;
    }

    let digest = hmac_sha256(secret, payload);
    let hex_encoded = hex::encode(&digest);
    let b64_encoded = base64::engine::general_purpose::STANDARD.encode(&digest);

    secure_eq(hex_encoded.as_bytes(), presented.as_bytes())
        || secure_eq(b64_encoded.as_bytes(), presented.as_bytes())
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn hmac_verification_accepts_hex_and_base64() {
        let payload = br#"{"orderId":"ord_1","status":"paid"}"#;
        let secret = "whsec_test";
        let digest = hmac_sha256(secret, payload);

        let hex_sig = hex::encode(&digest);
        assert!(verify_hmac_sha256(payload, secret, &hex_sig));
        assert!(verify_hmac_sha256(
            payload,
            secret,
            &format!("sha256={}", hex_sig)
        ));

        let b64_sig = base64::engine::general_purpose::STANDARD.encode(&digest);
        assert!(verify_hmac_sha256(payload, secret, &b64_sig));
    }

    #[test]
    fn hmac_verification_rejects_bad_signatures() {
        let payload = br#"{"orderId":"ord_1"}"#;
        assert!(!verify_hmac_sha256(payload, "secret", "not-a-signature"));
        assert!(!verify_hmac_sha256(payload, "secret", ""));
        assert!(!verify_hmac_sha256(payload, "secret", "sha256="));
    }

    #[test]
    fn hmac_verification_is_keyed() {
        let payload = b"body";
        let sig = hex::encode(hmac_sha256("right-secret", payload));
        assert!(verify_hmac_sha256(payload, "right-secret", &sig));
        assert!(!verify_hmac_sha256(payload, "wrong-secret", &sig));
    }
}

use crate::config::MailerConfig;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outbound customer notifications through a relay endpoint. Everything
/// here is best effort; a mail failure never rolls back a settlement.
#[derive(Clone)]
pub struct Mailer {
    client: Client,
    endpoint: Option<String>,
}

impl Mailer {
    pub fn new(config: &MailerConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: config.endpoint.clone(),
        }
    }

    pub async fn notify_order_paid(&self, account_id: Uuid, order_id: Uuid) {
        let Some(endpoint) = &self.endpoint else {
            debug!(%order_id, "mailer disabled, skipping paid notification");
            return;
        };

        let payload = serde_json::json!({
            "template": "order_paid",
            "account_id": account_id.to_string(),
            "order_id": order_id.to_string(),
        });

        match self.client.post(endpoint).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(%order_id, "paid notification sent");
            }
            Ok(resp) => {
                warn!(%order_id, status = %resp.status(), "paid notification rejected");
            }
            Err(err) => {
                warn!(%order_id, error = %err, "paid notification failed");
            }
        }
    }
}

use crate::payments::error::PaymentResult;
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::{ChargeRequest, CheckoutSession, PaymentMeta, ProviderName};
use async_trait::async_trait;
use tracing::info;

/// Manual bank transfer. No external call is made: the order stays pending
/// until the customer uploads a receipt and an operator approves it through
/// the admin review endpoint.
pub struct BankTransferAdapter {
    frontend_url: String,
}

impl BankTransferAdapter {
    pub fn new(frontend_url: String) -> Self {
        Self { frontend_url }
    }
}

#[async_trait]
impl PaymentAdapter for BankTransferAdapter {
    async fn create_payment(&self, request: &ChargeRequest) -> PaymentResult<CheckoutSession> {
        info!(order_id = %request.order_id, "bank transfer checkout opened");

        Ok(CheckoutSession {
            provider_ref: None,
            redirect_url: format!(
                "{}/{}/account?payment=pending&provider=manual-transfer",
                self.frontend_url.trim_end_matches('/'),
                request.locale
            ),
            meta: PaymentMeta::Manual {
                reference: None,
                note: None,
                receipt_url: None,
                review_note: None,
            },
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::ManualTransfer
    }
}

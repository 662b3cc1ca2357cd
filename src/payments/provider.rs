use crate::payments::error::PaymentResult;
use crate::payments::types::{ChargeRequest, CheckoutSession, ProviderName};
use async_trait::async_trait;

/// Common contract for the payment backends: open a pending payment intent
/// for an order and tell the storefront where to send the customer.
/// Verification of asynchronous notifications is channel-specific and lives
/// on the concrete adapters.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn create_payment(&self, request: &ChargeRequest) -> PaymentResult<CheckoutSession>;

    fn name(&self) -> ProviderName;
}

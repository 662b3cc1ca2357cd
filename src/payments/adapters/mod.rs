pub mod bank_transfer;
pub mod card;
pub mod gateway;

pub use bank_transfer::BankTransferAdapter;
pub use card::CardAdapter;
pub use gateway::{GatewayAdapter, GatewayVerification, CALLBACK_STATUS_OK};

use crate::config::AppConfig;
use crate::payments::error::PaymentResult;
use crate::payments::provider::PaymentAdapter;
use crate::payments::types::ProviderName;
use std::sync::Arc;

/// All configured adapters, built once at startup. Adapters that lack
/// credentials are still constructed; they fail with a configuration error
/// only when a checkout actually selects them.
#[derive(Clone)]
pub struct AdapterRegistry {
    pub card: Arc<CardAdapter>,
    pub gateway: Arc<GatewayAdapter>,
    pub bank_transfer: Arc<BankTransferAdapter>,
}

impl AdapterRegistry {
    pub fn from_config(config: &AppConfig) -> PaymentResult<Self> {
        Ok(Self {
            card: Arc::new(CardAdapter::new(
                config.card.clone(),
                config.server.frontend_url.clone(),
            )?),
            gateway: Arc::new(GatewayAdapter::new(config.gateway.clone(), config.rates)?),
            bank_transfer: Arc::new(BankTransferAdapter::new(
                config.server.frontend_url.clone(),
            )),
        })
    }

    pub fn get(&self, provider: ProviderName) -> Arc<dyn PaymentAdapter> {
        match provider {
            ProviderName::Card => self.card.clone(),
            ProviderName::RegionalGateway => self.gateway.clone(),
            ProviderName::ManualTransfer => self.bank_transfer.clone(),
        }
    }
}

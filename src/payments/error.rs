use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Webhook verification failed: {message}")]
    WebhookVerification { message: String },

    #[error("Provider error: provider={provider}, message={message}")]
    Provider {
        provider: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Validation { .. } => false,
            PaymentError::NotConfigured { .. } => false,
            PaymentError::Network { .. } => true,
            PaymentError::WebhookVerification { .. } => false,
            PaymentError::Provider { retryable, .. } => *retryable,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::NotConfigured { .. } => 500,
            PaymentError::Network { .. } => 503,
            PaymentError::WebhookVerification { .. } => 401,
            PaymentError::Provider { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Validation { message, .. } => message.clone(),
            PaymentError::NotConfigured { .. } => {
                "Payment provider is not available".to_string()
            }
            PaymentError::Network { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::WebhookVerification { .. } => "Invalid webhook signature".to_string(),
            PaymentError::Provider { .. } => "Payment provider returned an error".to_string(),
        }
    }
}

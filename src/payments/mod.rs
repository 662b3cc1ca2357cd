//! Payment channel integrations: the adapter contract, the concrete
//! card / regional-gateway / bank-transfer backends, and the shared
//! signature and HTTP plumbing.

pub mod adapters;
pub mod error;
pub mod provider;
pub mod types;
pub mod utils;

pub use adapters::AdapterRegistry;
pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentAdapter;
pub use types::{
    ChargeRequest, CheckoutSession, CouponKind, Currency, DiscountSnapshot, LicenseType,
    PaymentMeta, PaymentMetadata, ProviderName,
};

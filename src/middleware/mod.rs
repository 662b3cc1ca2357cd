pub mod auth;
pub mod error;
pub mod request_id;

pub use auth::{AdminAuth, AuthedAccount};
pub use error::ErrorResponse;

pub mod checkout;
pub mod downloads;
pub mod orders;
pub mod webhooks;

use crate::config::AppConfig;
use crate::database::{ApiKeyRepository, OrderRepository, PaymentRepository, ProductRepository};
use crate::payments::AdapterRegistry;
use crate::services::{
    AuditRecorder, CheckoutService, DownloadService, ReconcileService, UrlSigner,
};
use axum::routing::{get, post};
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared handler state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: PgPool,
    pub orders: OrderRepository,
    pub payments: PaymentRepository,
    pub products: ProductRepository,
    pub api_keys: ApiKeyRepository,
    pub adapters: AdapterRegistry,
    pub checkout: CheckoutService,
    pub reconciler: ReconcileService,
    pub downloads: DownloadService,
    pub signer: UrlSigner,
    pub audit: AuditRecorder,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(crate::health::health))
        .route("/api/checkout", post(checkout::create_checkout))
        .route("/api/orders/{id}", get(orders::get_order))
        .route("/api/orders/{id}/receipt", post(orders::attach_receipt))
        .route(
            "/admin/payments/{order_id}/review",
            post(orders::review_manual_payment),
        )
        .route("/api/downloads", post(downloads::issue_download))
        .route("/files/{*key}", get(downloads::verify_signed_link))
        .route("/webhooks/card", post(webhooks::card_webhook))
        .route("/webhooks/psp", post(webhooks::psp_webhook))
        .route(
            "/payments/gateway/callback",
            get(webhooks::gateway_callback),
        )
        .with_state(state)
}

use digishop_backend::api::{self, AppState};
use digishop_backend::config::AppConfig;
use digishop_backend::database::{
    self, ApiKeyRepository, AuditRepository, CouponRepository, DownloadRepository, OrderRepository,
    PaymentRepository, ProductRepository,
};
use digishop_backend::logging::init_tracing;
use digishop_backend::payments::AdapterRegistry;
use digishop_backend::services::{
    AuditRecorder, CheckoutService, DownloadService, EntitlementService, Mailer, ReconcileService,
    UrlSigner,
};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    config.validate()?;
    init_tracing(&config.logging);

    let pool = database::init_pool(&config.database).await?;

    let orders = OrderRepository::new(pool.clone());
    let payments = PaymentRepository::new(pool.clone());
    let products = ProductRepository::new(pool.clone());
    let coupons = CouponRepository::new(pool.clone());
    let downloads_repo = DownloadRepository::new(pool.clone());
    let api_keys = ApiKeyRepository::new(pool.clone());

    let audit = AuditRecorder::new(AuditRepository::new(pool.clone()));
    let adapters = AdapterRegistry::from_config(&config)?;
    let mailer = Mailer::new(&config.mailer);
    let signer = UrlSigner::new(&config.downloads);

    let entitlements = EntitlementService::new(
        orders.clone(),
        downloads_repo.clone(),
        coupons.clone(),
        audit.clone(),
        &config.downloads,
    );
    let reconciler = ReconcileService::new(
        pool.clone(),
        orders.clone(),
        payments.clone(),
        entitlements,
        audit.clone(),
        mailer,
    );
    let checkout = CheckoutService::new(
        products.clone(),
        coupons,
        orders.clone(),
        payments.clone(),
        adapters.clone(),
        config.policy.clone(),
        config.card.currencies.clone(),
        config.rates,
        audit.clone(),
    );
    let downloads = DownloadService::new(
        downloads_repo,
        products.clone(),
        signer.clone(),
        audit.clone(),
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        orders,
        payments,
        products,
        api_keys,
        adapters,
        checkout,
        reconciler,
        downloads,
        signer,
        audit,
    };

    let app = api::router(state)
        .layer(axum::middleware::from_fn(
            digishop_backend::middleware::request_id::with_request_id,
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

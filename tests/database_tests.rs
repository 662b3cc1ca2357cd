//! Repository tests against a live Postgres. Ignored by default; run with
//! `cargo test -- --ignored` after pointing DATABASE_URL at a migrated
//! test database.

use chrono::{Duration, Utc};
use digishop_backend::config::{
    AppConfig, CardConfig, DatabaseConfig, DownloadConfig, GatewayConfig, LogFormat,
    LoggingConfig, MailerConfig, ProviderPolicy, PspConfig, RateTable, ServerConfig,
};
use digishop_backend::database::order_repository::NewCheckout;
use digishop_backend::database::{
    AuditRepository, CouponRepository, DownloadRepository, OrderRepository, PaymentRepository,
    ProductRepository,
};
use digishop_backend::error::ApiError;
use digishop_backend::payments::types::{Currency, LicenseType, ProviderName};
use digishop_backend::payments::AdapterRegistry;
use digishop_backend::services::{
    AuditRecorder, CheckoutInput, CheckoutService, EntitlementService, Mailer, ReconcileService,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
    PgPool::connect(&url).await.expect("connect to test db")
}

async fn seed_product(pool: &PgPool) -> Uuid {
    let slug = format!("test-{}", Uuid::new_v4().simple());
    let (id,): (Uuid,) =
        sqlx::query_as("INSERT INTO products (slug, title) VALUES ($1, 'Test') RETURNING id")
            .bind(&slug)
            .fetch_one(pool)
            .await
            .expect("seed product");
    id
}

#[tokio::test]
#[ignore]
async fn order_paid_transition_fires_exactly_once() {
    let pool = test_pool().await;
    let orders = OrderRepository::new(pool.clone());
    let product_id = seed_product(&pool).await;

    let (order, _payment) = orders
        .create_checkout(&NewCheckout {
            account_id: Uuid::new_v4(),
            product_id,
            license: "personal".to_string(),
            currency: "USD".to_string(),
            unit_amount: 49,
            total: 49,
            provider: "card".to_string(),
            metadata: serde_json::json!({ "provider": "card" }),
        })
        .await
        .expect("create checkout");

    assert_eq!(orders.mark_paid_if_not_already(order.id).await.unwrap(), 1);
    // Every duplicate notification observes zero rows.
    assert_eq!(orders.mark_paid_if_not_already(order.id).await.unwrap(), 0);

    // Paid orders never regress to failed.
    assert_eq!(orders.mark_failed_if_pending(order.id).await.unwrap(), 0);
    let reloaded = orders.find_by_id(order.id).await.unwrap();
    assert_eq!(reloaded.status, "paid");
}

#[tokio::test]
#[ignore]
async fn settlement_grants_tokens_with_the_paid_transition() {
    let pool = test_pool().await;
    let orders = OrderRepository::new(pool.clone());
    let payments = PaymentRepository::new(pool.clone());
    let downloads = DownloadRepository::new(pool.clone());
    let coupons = CouponRepository::new(pool.clone());
    let audit = AuditRecorder::new(AuditRepository::new(pool.clone()));

    let entitlements = EntitlementService::new(
        orders.clone(),
        downloads.clone(),
        coupons,
        audit.clone(),
        &DownloadConfig {
            token_ttl_days: 30,
            token_max_uses: 10,
            url_ttl_secs: 600,
            signing_secret: "db-test-secret".to_string(),
            base_url: "https://files.example.com".to_string(),
        },
    );
    let reconciler = ReconcileService::new(
        pool.clone(),
        orders.clone(),
        payments,
        entitlements,
        audit,
        Mailer::new(&MailerConfig {
            endpoint: None,
            timeout_secs: 1,
        }),
    );

    let product_id = seed_product(&pool).await;
    let account_id = Uuid::new_v4();
    let (order, payment) = orders
        .create_checkout(&NewCheckout {
            account_id,
            product_id,
            license: "personal".to_string(),
            currency: "USD".to_string(),
            unit_amount: 49,
            total: 49,
            provider: "card".to_string(),
            metadata: serde_json::json!({ "provider": "card" }),
        })
        .await
        .expect("create checkout");

    let settled = reconciler
        .confirm_paid(&payment, Some("ref-1"), serde_json::json!({}), "test")
        .await
        .unwrap();
    assert!(settled);

    // The paid order and its token land together or not at all.
    assert_eq!(orders.find_by_id(order.id).await.unwrap().status, "paid");
    assert!(downloads
        .find_usable_token(account_id, product_id)
        .await
        .is_ok());

    // A duplicate notification settles nothing and grants nothing.
    let again = reconciler
        .confirm_paid(&payment, Some("ref-1"), serde_json::json!({}), "test")
        .await
        .unwrap();
    assert!(!again);

    let (token_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM download_tokens WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(token_count, 1);
}

#[tokio::test]
#[ignore]
async fn coupon_increment_respects_usage_cap() {
    let pool = test_pool().await;
    let coupons = CouponRepository::new(pool.clone());

    let code = format!("CAP-{}", Uuid::new_v4().simple());
    let (coupon_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO coupons (code, kind, amount, max_uses)
        VALUES ($1, 'percent', 10, 2)
        RETURNING id
        "#,
    )
    .bind(&code)
    .fetch_one(&pool)
    .await
    .expect("seed coupon");

    assert_eq!(coupons.increment_usage_if_available(coupon_id).await.unwrap(), 1);
    assert_eq!(coupons.increment_usage_if_available(coupon_id).await.unwrap(), 1);
    // Cap reached, the increment stops landing.
    assert_eq!(coupons.increment_usage_if_available(coupon_id).await.unwrap(), 0);

    let found = coupons.find_by_code(&code).await.unwrap();
    assert_eq!(found.used_count, 2);
}

fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            frontend_url: "http://localhost:3000".to_string(),
        },
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
            connection_timeout: 5,
            idle_timeout: None,
        },
        logging: LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Plain,
        },
        card: CardConfig {
            secret_key: Some("sk_test".to_string()),
            webhook_secret: Some("whsec_test".to_string()),
            base_url: "https://api.cardprocessor.example".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            currencies: vec![Currency::Usd, Currency::Eur],
        },
        gateway: GatewayConfig {
            merchant_id: None,
            base_url: "https://pay.gateway.example".to_string(),
            callback_base_url: "http://localhost:8000".to_string(),
            mock_mode: true,
            timeout_secs: 5,
            max_retries: 0,
        },
        psp: PspConfig {
            webhook_secret: None,
        },
        policy: ProviderPolicy {
            gateway_countries: vec!["TR".to_string()],
            bank_transfer_countries: vec!["EG".to_string()],
        },
        rates: RateTable {
            units_per_usd: 50_000,
            units_per_eur: 55_000,
        },
        downloads: DownloadConfig {
            token_ttl_days: 30,
            token_max_uses: 10,
            url_ttl_secs: 600,
            signing_secret: "db-test-secret".to_string(),
            base_url: "https://files.example.com".to_string(),
        },
        mailer: MailerConfig {
            endpoint: None,
            timeout_secs: 1,
        },
        admin_token: None,
    }
}

fn checkout_service(pool: &PgPool, config: &AppConfig) -> CheckoutService {
    CheckoutService::new(
        ProductRepository::new(pool.clone()),
        CouponRepository::new(pool.clone()),
        OrderRepository::new(pool.clone()),
        PaymentRepository::new(pool.clone()),
        AdapterRegistry::from_config(config).expect("adapters"),
        config.policy.clone(),
        config.card.currencies.clone(),
        config.rates,
        AuditRecorder::new(AuditRepository::new(pool.clone())),
    )
}

fn checkout_input(account_id: Uuid, slug: &str, provider: ProviderName) -> CheckoutInput {
    CheckoutInput {
        account_id,
        product_slug: slug.to_string(),
        license: LicenseType::Personal,
        currency: Currency::Usd,
        provider,
        coupon_code: None,
        country: "US".to_string(),
        locale: "en".to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn checkout_resolves_the_product_before_the_provider_gate() {
    let pool = test_pool().await;
    let config = test_config();
    let checkout = checkout_service(&pool, &config);
    let account_id = Uuid::new_v4();

    // Unknown product wins over the disallowed provider: bank transfer is
    // not open to US but the slug does not exist either.
    let missing = format!("missing-{}", Uuid::new_v4().simple());
    let err = checkout
        .create(checkout_input(account_id, &missing, ProviderName::ManualTransfer))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    // Known product, disallowed provider: the gate fires before any order
    // or payment row exists.
    let product_id = seed_product(&pool).await;
    sqlx::query(
        "INSERT INTO product_prices (product_id, license, currency, amount) VALUES ($1, 'personal', 'USD', 49)",
    )
    .bind(product_id)
    .execute(&pool)
    .await
    .expect("seed price");
    let (slug,): (String,) = sqlx::query_as("SELECT slug FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&pool)
        .await
        .unwrap();

    let err = checkout
        .create(checkout_input(account_id, &slug, ProviderName::ManualTransfer))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ProviderNotAllowed));

    let (order_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM orders WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(order_count, 0);
}

#[tokio::test]
#[ignore]
async fn download_token_consumption_stops_at_the_cap_and_logs() {
    let pool = test_pool().await;
    let downloads = DownloadRepository::new(pool.clone());
    let product_id = seed_product(&pool).await;
    let account_id = Uuid::new_v4();

    let token = downloads
        .create_token(account_id, product_id, Utc::now() + Duration::days(30), 2)
        .await
        .expect("create token");

    for _ in 0..2 {
        let rows = downloads
            .consume_token_and_log(token.id, account_id, product_id, Some("127.0.0.1"), None)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    // Exhausted: no increment and no log row.
    let rows = downloads
        .consume_token_and_log(token.id, account_id, product_id, Some("127.0.0.1"), None)
        .await
        .unwrap();
    assert_eq!(rows, 0);

    let (log_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM download_logs WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(log_count, 2);

    assert!(downloads
        .find_usable_token(account_id, product_id)
        .await
        .is_err());
}

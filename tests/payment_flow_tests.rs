//! Provider-independent payment logic: signatures, pricing, the gateway
//! mock handshake and the provider policy. Nothing here needs a database
//! or network.

use chrono::Utc;
use digishop_backend::config::{CardConfig, GatewayConfig, ProviderPolicy, RateTable};
use digishop_backend::database::coupon_repository::Coupon;
use digishop_backend::error::ApiError;
use digishop_backend::payments::adapters::{CardAdapter, GatewayAdapter};
use digishop_backend::payments::types::{
    ChargeRequest, Currency, LicenseType, PaymentMeta, ProviderName,
};
use digishop_backend::payments::utils::{hmac_sha256, verify_hmac_sha256};
use digishop_backend::payments::PaymentAdapter;
use digishop_backend::services::checkout::CheckoutService;
use digishop_backend::services::pricing::resolve_quote;
use std::str::FromStr;
use uuid::Uuid;

fn rates() -> RateTable {
    RateTable {
        units_per_usd: 50_000,
        units_per_eur: 55_000,
    }
}

fn charge_request(order_id: Uuid, amount: i64, currency: Currency) -> ChargeRequest {
    ChargeRequest {
        order_id,
        payment_id: Uuid::new_v4(),
        account_id: Uuid::new_v4(),
        product_id: Uuid::new_v4(),
        license: LicenseType::Personal,
        amount,
        currency,
        coupon: None,
        locale: "en".to_string(),
    }
}

#[test]
fn card_webhook_signature_round_trip() {
    let adapter = CardAdapter::new(
        CardConfig {
            secret_key: Some("sk_test".to_string()),
            webhook_secret: Some("whsec_roundtrip".to_string()),
            base_url: "https://api.cardprocessor.example".to_string(),
            timeout_secs: 5,
            max_retries: 0,
            currencies: vec![Currency::Usd, Currency::Eur],
        },
        "http://localhost:3000".to_string(),
    )
    .unwrap();

    let body = br#"{"type":"checkout.session.completed","data":{"object":{"id":"cs_1"}}}"#;
    let timestamp = Utc::now().timestamp();
    let mut signed = format!("{}.", timestamp).into_bytes();
    signed.extend_from_slice(body);
    let header = format!(
        "t={},v1={}",
        timestamp,
        hex::encode(hmac_sha256("whsec_roundtrip", &signed))
    );

    assert!(adapter.verify_signature(body, &header).is_ok());

    // A single flipped byte in the body must break the signature.
    let mut tampered = body.to_vec();
    tampered[10] ^= 1;
    assert!(adapter.verify_signature(&tampered, &header).is_err());
}

#[test]
fn psp_signature_accepts_prefixed_and_base64_forms() {
    let body = br#"{"orderId":"11111111-1111-1111-1111-111111111111","status":"paid"}"#;
    let secret = "psp-secret";
    let digest = hmac_sha256(secret, body);

    let hex_sig = hex::encode(&digest);
    assert!(verify_hmac_sha256(body, secret, &hex_sig));
    assert!(verify_hmac_sha256(body, secret, &format!("sha256={}", hex_sig)));
    assert!(!verify_hmac_sha256(body, "other-secret", &hex_sig));
}

#[tokio::test]
async fn mock_gateway_handshake_settles_end_to_end() {
    let adapter = GatewayAdapter::new(
        GatewayConfig {
            merchant_id: None,
            base_url: "https://pay.gateway.example".to_string(),
            callback_base_url: "http://localhost:8000".to_string(),
            mock_mode: true,
            timeout_secs: 5,
            max_retries: 0,
        },
        rates(),
    )
    .unwrap();

    let order_id = Uuid::new_v4();
    let session = adapter
        .create_payment(&charge_request(order_id, 49, Currency::Usd))
        .await
        .unwrap();

    let authority = session.provider_ref.expect("mock authority");
    assert!(session.redirect_url.contains("Status=OK"));

    let native_amount = match session.meta {
        PaymentMeta::Gateway { native_amount, .. } => native_amount.unwrap(),
        other => panic!("unexpected meta: {:?}", other),
    };
    assert_eq!(native_amount, 2_450_000);

    let verification = adapter.verify(&authority, native_amount).await.unwrap();
    assert!(verification.ref_id.is_some());

    // Foreign authorities never verify in mock mode.
    assert!(adapter.verify("A000099", native_amount).await.is_err());
}

#[test]
fn coupon_pricing_covers_the_checkout_scenarios() {
    let now = Utc::now();
    let base_coupon = |kind: &str, amount: i64| Coupon {
        id: Uuid::new_v4(),
        code: "LAUNCH".to_string(),
        kind: kind.to_string(),
        amount,
        currency: None,
        max_uses: Some(100),
        used_count: 0,
        expires_at: None,
        is_active: true,
    };

    // 25% of 80 EUR
    let c = base_coupon("percent", 25);
    let (quote, _) = resolve_quote(80, Currency::Eur, Some(&c), &rates(), now).unwrap();
    assert_eq!(quote.total, 60);

    // fixed 11 USD applied to a EUR checkout converts through the table
    let mut c = base_coupon("fixed", 11);
    c.currency = Some("USD".to_string());
    let (quote, snapshot) = resolve_quote(80, Currency::Eur, Some(&c), &rates(), now).unwrap();
    assert_eq!(quote.discount, 10);
    assert_eq!(quote.total, 70);
    assert_eq!(snapshot.unwrap().discount, 10);

    // exhausted
    let mut c = base_coupon("percent", 10);
    c.used_count = 100;
    assert!(matches!(
        resolve_quote(80, Currency::Eur, Some(&c), &rates(), now),
        Err(ApiError::CouponExhausted)
    ));
}

#[test]
fn provider_policy_gates_regional_channels() {
    let policy = ProviderPolicy {
        gateway_countries: vec!["TR".to_string()],
        bank_transfer_countries: vec!["EG".to_string()],
    };
    let card = vec![Currency::Usd, Currency::Eur];

    assert_eq!(
        CheckoutService::allowed_providers(&policy, &card, "DE", Currency::Usd),
        vec![ProviderName::Card]
    );
    assert!(
        CheckoutService::allowed_providers(&policy, &card, "TR", Currency::Usd)
            .contains(&ProviderName::RegionalGateway)
    );
    assert!(
        CheckoutService::allowed_providers(&policy, &card, "eg", Currency::Eur)
            .contains(&ProviderName::ManualTransfer)
    );

    // Card drops out when the checkout currency is not card-supported,
    // even where the regional channels remain open.
    let usd_only = vec![Currency::Usd];
    let providers = CheckoutService::allowed_providers(&policy, &usd_only, "TR", Currency::Eur);
    assert!(!providers.contains(&ProviderName::Card));
    assert_eq!(providers, vec![ProviderName::RegionalGateway]);
}

#[test]
fn provider_names_parse_their_wire_spellings() {
    assert_eq!(ProviderName::from_str("card").unwrap(), ProviderName::Card);
    assert_eq!(
        ProviderName::from_str("gateway").unwrap(),
        ProviderName::RegionalGateway
    );
    assert_eq!(
        ProviderName::from_str("bank-transfer").unwrap(),
        ProviderName::ManualTransfer
    );
    assert!(ProviderName::from_str("crypto").is_err());
}

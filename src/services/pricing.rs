use crate::config::RateTable;
use crate::database::coupon_repository::Coupon;
use crate::error::{ApiError, ApiResult};
use crate::payments::types::{CouponKind, Currency, DiscountSnapshot};
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// Resolved charge for a checkout. `total` is what the provider is asked
/// to collect; it never drops below one whole currency unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
}

/// Validates a coupon against the clock and its usage counters and computes
/// the discounted total. Pure, so every rejection path is unit-testable.
pub fn resolve_quote(
    subtotal: i64,
    currency: Currency,
    coupon: Option<&Coupon>,
    rates: &RateTable,
    now: DateTime<Utc>,
) -> ApiResult<(Quote, Option<DiscountSnapshot>)> {
    let Some(coupon) = coupon else {
        return Ok((
            Quote {
                subtotal,
                discount: 0,
                total: subtotal,
            },
            None,
        ));
    };

    if !coupon.is_active {
        return Err(ApiError::CouponInvalid);
    }
    if let Some(expires_at) = coupon.expires_at {
        if expires_at <= now {
            return Err(ApiError::CouponExpired);
        }
    }
    if let Some(max_uses) = coupon.max_uses {
        if coupon.used_count >= max_uses {
            return Err(ApiError::CouponExhausted);
        }
    }

    let kind = match coupon.kind.as_str() {
        "percent" => CouponKind::Percent,
        "fixed" => CouponKind::Fixed,
        _ => return Err(ApiError::CouponInvalid),
    };

    let raw_discount = match kind {
        CouponKind::Percent => {
            if coupon.amount < 0 || coupon.amount > 100 {
                return Err(ApiError::CouponInvalid);
            }
            ((subtotal as f64) * (coupon.amount as f64) / 100.0).round() as i64
        }
        CouponKind::Fixed => {
            // Fixed coupons may be denominated in a different currency than
            // the checkout; convert through the shared rate table.
            let coupon_currency = match coupon.currency.as_deref() {
                Some(raw) => Currency::from_str(raw).map_err(|_| ApiError::CouponInvalid)?,
                None => currency,
            };
            rates.convert(coupon.amount, coupon_currency, currency)
        }
    };

    // The customer always pays at least one unit; a subtotal at or below
    // one unit leaves no room for any discount.
    let discount = if subtotal <= 1 {
        0
    } else {
        raw_discount.clamp(0, subtotal - 1)
    };
    let total = subtotal - discount;

    let snapshot = DiscountSnapshot {
        coupon_id: coupon.id,
        code: coupon.code.clone(),
        kind,
        amount: coupon.amount,
        currency: match kind {
            CouponKind::Fixed => Some(
                coupon
                    .currency
                    .as_deref()
                    .and_then(|raw| Currency::from_str(raw).ok())
                    .unwrap_or(currency),
            ),
            CouponKind::Percent => None,
        },
        discount,
    };

    Ok((
        Quote {
            subtotal,
            discount,
            total,
        },
        Some(snapshot),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn rates() -> RateTable {
        RateTable {
            units_per_usd: 50_000,
            units_per_eur: 55_000,
        }
    }

    fn coupon(kind: &str, amount: i64) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: "TEST".to_string(),
            kind: kind.to_string(),
            amount,
            currency: None,
            max_uses: None,
            used_count: 0,
            expires_at: None,
            is_active: true,
        }
    }

    #[test]
    fn no_coupon_charges_full_subtotal() {
        let (quote, snapshot) =
            resolve_quote(49, Currency::Usd, None, &rates(), Utc::now()).unwrap();
        assert_eq!(quote.total, 49);
        assert_eq!(quote.discount, 0);
        assert!(snapshot.is_none());
    }

    #[test]
    fn percent_coupon_rounds_half_up() {
        // 10% of 49 is 4.9, rounds to 5
        let c = coupon("percent", 10);
        let (quote, snapshot) =
            resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.discount, 5);
        assert_eq!(quote.total, 44);
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.kind, CouponKind::Percent);
        assert_eq!(snapshot.discount, 5);
    }

    #[test]
    fn fixed_coupon_same_currency_subtracts_directly() {
        let mut c = coupon("fixed", 20);
        c.currency = Some("USD".to_string());
        let (quote, _) =
            resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.discount, 20);
        assert_eq!(quote.total, 29);
    }

    #[test]
    fn fixed_coupon_converts_across_currencies() {
        // 11 USD = 550_000 native = 10 EUR at the fixed rates
        let mut c = coupon("fixed", 11);
        c.currency = Some("USD".to_string());
        let (quote, snapshot) =
            resolve_quote(49, Currency::Eur, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.discount, 10);
        assert_eq!(quote.total, 39);
        assert_eq!(snapshot.unwrap().currency, Some(Currency::Usd));
    }

    #[test]
    fn oversized_discount_clamps_to_one_unit_remaining() {
        let mut c = coupon("fixed", 500);
        c.currency = Some("USD".to_string());
        let (quote, _) =
            resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.discount, 48);
        assert_eq!(quote.total, 1);
    }

    #[test]
    fn full_percent_coupon_still_leaves_one_unit() {
        let c = coupon("percent", 100);
        let (quote, _) =
            resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.total, 1);
    }

    #[test]
    fn zero_subtotal_with_coupon_takes_no_discount() {
        let c = coupon("percent", 10);
        let (quote, snapshot) =
            resolve_quote(0, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.discount, 0);
        assert_eq!(quote.total, 0);
        assert_eq!(snapshot.unwrap().discount, 0);
    }

    #[test]
    fn one_unit_subtotal_with_coupon_takes_no_discount() {
        let mut c = coupon("fixed", 50);
        c.currency = Some("USD".to_string());
        let (quote, _) =
            resolve_quote(1, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap();
        assert_eq!(quote.discount, 0);
        assert_eq!(quote.total, 1);
    }

    #[test]
    fn inactive_coupon_is_rejected() {
        let mut c = coupon("percent", 10);
        c.is_active = false;
        let err = resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::CouponInvalid));
    }

    #[test]
    fn expired_coupon_is_rejected() {
        let mut c = coupon("percent", 10);
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        let err = resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::CouponExpired));
    }

    #[test]
    fn exhausted_coupon_is_rejected() {
        let mut c = coupon("percent", 10);
        c.max_uses = Some(3);
        c.used_count = 3;
        let err = resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::CouponExhausted));
    }

    #[test]
    fn unknown_coupon_kind_is_rejected() {
        let c = coupon("bogo", 1);
        let err = resolve_quote(49, Currency::Usd, Some(&c), &rates(), Utc::now()).unwrap_err();
        assert!(matches!(err, ApiError::CouponInvalid));
    }
}

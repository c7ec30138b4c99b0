//! Property-based tests for the pricing engine.
//!
//! These tests use proptest to verify invariants across a wide range of
//! inputs, helping to catch edge cases that unit tests might miss. All
//! generated amounts use two decimal places, matching stored prices.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use sobuy_api::entities::coupon;
use sobuy_api::pricing::{check_coupon_terms, compute_discount, normalize_code, quote, CouponRejection, PricedLine};
use sobuy_api::session::{CouponSnapshot, DeliverySnapshot};

// Strategies for generating test data
fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn positive_money_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    // 0.01% through 100.00%
    (1i64..=10_000).prop_map(|basis| Decimal::new(basis, 2))
}

fn lines_strategy() -> impl Strategy<Value = Vec<PricedLine>> {
    prop::collection::vec(
        (any::<u128>(), positive_money_strategy(), 1i32..50),
        0..6,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(raw_id, unit_price, quantity)| {
                let product_id = Uuid::from_u128(raw_id);
                PricedLine::new(
                    product_id.to_string(),
                    product_id,
                    "Generated".to_string(),
                    None,
                    quantity,
                    unit_price,
                )
            })
            .collect()
    })
}

fn coupon_strategy() -> impl Strategy<Value = CouponSnapshot> {
    (
        any::<u128>(),
        percent_strategy(),
        prop::option::of(positive_money_strategy()),
    )
        .prop_map(|(raw_id, discount_percent, max_discount_amount)| CouponSnapshot {
            id: Uuid::from_u128(raw_id),
            code: "PROPTEST".to_string(),
            discount_percent,
            max_discount_amount,
        })
}

fn delivery_strategy() -> impl Strategy<Value = DeliverySnapshot> {
    money_strategy().prop_map(|amount| DeliverySnapshot {
        key: "inside-dhaka".to_string(),
        label: "Inside Dhaka".to_string(),
        amount,
    })
}

fn coupon_row(
    max_uses_per_user: Option<i32>,
    max_total_uses: Option<i32>,
    total_uses: i32,
    is_active: bool,
) -> coupon::Model {
    coupon::Model {
        id: Uuid::new_v4(),
        code: "PROPTEST".to_string(),
        discount_percent: Decimal::new(1000, 2),
        max_discount_amount: None,
        max_uses_per_user,
        max_total_uses,
        total_uses,
        is_active,
        expires_at: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

// Property: discounts stay inside their bounds
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn discount_never_exceeds_subtotal_or_cap(
        subtotal in money_strategy(),
        percent in percent_strategy(),
        cap in prop::option::of(positive_money_strategy()),
    ) {
        let discount = compute_discount(subtotal, percent, cap);
        prop_assert!(discount >= Decimal::ZERO, "discount went negative: {}", discount);
        prop_assert!(discount <= subtotal, "discount {} exceeds subtotal {}", discount, subtotal);
        if let Some(cap) = cap {
            prop_assert!(discount <= cap, "discount {} exceeds cap {}", discount, cap);
        }
    }

    #[test]
    fn discount_grows_with_the_percent(
        subtotal in money_strategy(),
        low in 1i64..5_000,
        bump in 0i64..5_000,
    ) {
        let low_pct = Decimal::new(low, 2);
        let high_pct = Decimal::new(low + bump, 2);
        let low_discount = compute_discount(subtotal, low_pct, None);
        let high_discount = compute_discount(subtotal, high_pct, None);
        prop_assert!(
            low_discount <= high_discount,
            "{}% gave {} but {}% gave {}",
            low_pct, low_discount, high_pct, high_discount
        );
    }

    #[test]
    fn a_full_discount_zeroes_the_goods(subtotal in money_strategy()) {
        let discount = compute_discount(subtotal, Decimal::ONE_HUNDRED, None);
        prop_assert_eq!(discount, subtotal);
    }
}

// Property: the quote is an arithmetic identity over its parts
proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn quote_balances(
        lines in lines_strategy(),
        coupon in prop::option::of(coupon_strategy()),
        delivery in prop::option::of(delivery_strategy()),
    ) {
        let q = quote(&lines, coupon.as_ref(), delivery.as_ref());

        let expected_subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
        prop_assert_eq!(q.subtotal, expected_subtotal);
        prop_assert_eq!(q.grand_total, q.subtotal - q.discount_amount + q.delivery_amount);
        prop_assert!(q.grand_total >= Decimal::ZERO, "grand total went negative: {}", q.grand_total);
        prop_assert!(q.success);

        if coupon.is_none() {
            prop_assert_eq!(q.discount_amount, Decimal::ZERO);
        }
        match delivery {
            Some(d) => prop_assert_eq!(q.delivery_amount, d.amount),
            None => prop_assert_eq!(q.delivery_amount, Decimal::ZERO),
        }
    }

    #[test]
    fn quoting_is_pure(
        lines in lines_strategy(),
        coupon in prop::option::of(coupon_strategy()),
        delivery in prop::option::of(delivery_strategy()),
    ) {
        let first = quote(&lines, coupon.as_ref(), delivery.as_ref());
        let second = quote(&lines, coupon.as_ref(), delivery.as_ref());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn line_totals_scale_with_quantity(
        unit_price in positive_money_strategy(),
        quantity in 1i32..1_000,
    ) {
        let line = PricedLine::new(
            "key".to_string(),
            Uuid::nil(),
            "Generated".to_string(),
            None,
            quantity,
            unit_price,
        );
        prop_assert_eq!(line.line_total, unit_price * Decimal::from(quantity));
    }
}

// Property: code normalization and coupon terms
proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn normalizing_a_code_is_idempotent(code in "[ a-zA-Z0-9-]{0,24}") {
        let once = normalize_code(&code);
        prop_assert_eq!(normalize_code(&once), once.clone());
        prop_assert!(!once.starts_with(' ') && !once.ends_with(' '));
    }

    #[test]
    fn an_inactive_coupon_loses_to_every_other_reason(
        per_user in prop::option::of(1i32..5),
        max_total in prop::option::of(1i32..5),
        total_uses in 0i32..10,
        user_count in 0i64..10,
        cart_is_empty in any::<bool>(),
    ) {
        let row = coupon_row(per_user, max_total, total_uses, false);
        prop_assert_eq!(
            check_coupon_terms(&row, Utc::now(), user_count, cart_is_empty),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn exhausted_coupons_reject_before_user_limits(
        limit in 1i32..10,
        extra in 0i32..5,
        user_count in 0i64..10,
    ) {
        let row = coupon_row(Some(1), Some(limit), limit + extra, true);
        prop_assert_eq!(
            check_coupon_terms(&row, Utc::now(), user_count, false),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn a_clean_coupon_passes_any_future_expiry(hours in 1i64..10_000) {
        let mut row = coupon_row(None, None, 0, true);
        row.expires_at = Some(Utc::now() + Duration::hours(hours));
        prop_assert!(check_coupon_terms(&row, Utc::now(), 0, false).is_ok());
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::coupon;
use crate::session::{CouponSnapshot, DeliverySnapshot};

/// A cart line resolved against the live catalog. Built by the cart and
/// checkout services, priced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub key: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub color: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl PricedLine {
    pub fn new(
        key: String,
        product_id: Uuid,
        product_name: String,
        color: Option<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        let line_total = unit_price * Decimal::from(quantity);
        Self {
            key,
            product_id,
            product_name,
            color,
            quantity,
            unit_price,
            line_total,
        }
    }
}

/// The money summary shown with every cart view, coupon apply and checkout
/// response. All amounts are rounded to 2 decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartQuote {
    pub success: bool,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub delivery_amount: Decimal,
    pub grand_total: Decimal,
}

/// Why a coupon cannot be used. Each case carries its own shopper-readable
/// message; the variants also drive commit-time rejection during checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Coupon code not found")]
    NotFound,
    #[error("This coupon is no longer active")]
    Inactive,
    #[error("This coupon has expired")]
    Expired,
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("You have already used this coupon the maximum number of times")]
    UserLimitReached,
    #[error("Add items to your cart before applying a coupon")]
    EmptyCart,
}

fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Discount for `subtotal` under the given percent and optional cap.
/// Rounded to 2 dp, clamped to the cap and then to the subtotal so the
/// grand total can never go negative.
pub fn compute_discount(
    subtotal: Decimal,
    discount_percent: Decimal,
    max_discount_amount: Option<Decimal>,
) -> Decimal {
    let mut discount = round_money(subtotal * discount_percent / Decimal::ONE_HUNDRED);
    if let Some(cap) = max_discount_amount {
        if discount > cap {
            discount = round_money(cap);
        }
    }
    if discount > subtotal {
        discount = subtotal;
    }
    if discount < Decimal::ZERO {
        discount = Decimal::ZERO;
    }
    discount
}

/// Prices a resolved cart against the session's coupon and delivery
/// snapshots. Pure; the same function backs the cart view quote and the
/// totals written at checkout.
pub fn quote(
    lines: &[PricedLine],
    coupon: Option<&CouponSnapshot>,
    delivery: Option<&DeliverySnapshot>,
) -> CartQuote {
    let subtotal: Decimal = lines.iter().map(|l| l.line_total).sum();
    let subtotal = round_money(subtotal);

    let discount_amount = match coupon {
        Some(c) => compute_discount(subtotal, c.discount_percent, c.max_discount_amount),
        None => Decimal::ZERO,
    };

    let delivery_amount = delivery.map(|d| round_money(d.amount)).unwrap_or(Decimal::ZERO);

    CartQuote {
        success: true,
        subtotal,
        discount_amount,
        delivery_amount,
        grand_total: subtotal - discount_amount + delivery_amount,
    }
}

/// Checks the coupon's own terms against a cart. `user_use_count` is the
/// caller-supplied number of committed redemptions by this user; the
/// total-use ceiling is checked from the row itself. Order of checks is
/// fixed so shoppers always see the most specific reason.
pub fn check_coupon_terms(
    coupon: &coupon::Model,
    now: DateTime<Utc>,
    user_use_count: i64,
    cart_is_empty: bool,
) -> Result<(), CouponRejection> {
    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.is_expired(now) {
        return Err(CouponRejection::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponRejection::UsageLimitReached);
    }
    if let Some(per_user) = coupon.max_uses_per_user {
        if user_use_count >= i64::from(per_user) {
            return Err(CouponRejection::UserLimitReached);
        }
    }
    if cart_is_empty {
        return Err(CouponRejection::EmptyCart);
    }
    Ok(())
}

/// Uppercases and trims a shopper-supplied coupon code for lookup; codes
/// are stored uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

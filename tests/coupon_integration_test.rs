//! Integration tests for coupons.
//!
//! Tests cover:
//! - Admin CRUD with code normalization and validation
//! - Applying codes against the session cart
//! - Every rejection reason surfaced to the shopper
//! - The discount cap

mod common;

use axum::{body, http::Method, response::Response};
use chrono::{Duration, Utc};
use common::{percent_coupon, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn money(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("money field serialized as string")
        .parse()
        .expect("money field parses as decimal")
}

/// Put one 750-taka item in a fresh session cart and return the session id.
async fn session_with_items(app: &TestApp, quantity: i32) -> String {
    let product = app.seed_product("Clay Teapot", dec!(750), None).await;
    let session = TestApp::new_session_id();
    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product.id, "quantity": quantity })),
            None,
            &session,
        )
        .await;
    assert_eq!(response.status(), 200);
    session
}

// ==================== Admin CRUD ====================

#[tokio::test]
async fn coupon_codes_are_stored_uppercase() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "  save10 ", "discount_percent": "10" })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let coupon = response_json(response).await;
    assert_eq!(coupon["code"], "SAVE10");
    assert_eq!(coupon["total_uses"], 0);
    assert_eq!(coupon["is_active"], true);

    // The same code in another case is a duplicate
    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "Save10", "discount_percent": "15" })),
        )
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn coupon_creation_is_validated() {
    let app = TestApp::new().await;

    for payload in [
        json!({ "code": "", "discount_percent": "10" }),
        json!({ "code": "SAVE", "discount_percent": "0" }),
        json!({ "code": "SAVE", "discount_percent": "101" }),
        json!({ "code": "SAVE", "discount_percent": "10", "max_discount_amount": "0" }),
        json!({ "code": "SAVE", "discount_percent": "10", "max_total_uses": 0 }),
    ] {
        let response = app
            .request_as_admin(Method::POST, "/api/v1/admin/coupons", Some(payload.clone()))
            .await;
        assert_eq!(response.status(), 400, "payload should be rejected: {}", payload);
    }
}

#[tokio::test]
async fn coupons_can_be_updated_and_deleted() {
    let app = TestApp::new().await;
    let coupon = app.seed_coupon(percent_coupon("SAVE10", dec!(10))).await;
    let uri = format!("/api/v1/admin/coupons/{}", coupon.id);

    let response = app
        .request_as_admin(
            Method::PUT,
            &uri,
            Some(json!({ "discount_percent": "25", "is_active": false })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(money(&body["discount_percent"]), dec!(25));
    assert_eq!(body["is_active"], false);

    let response = app.request_as_admin(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), 204);

    let response = app.request_as_admin(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn coupon_management_is_admin_only() {
    let app = TestApp::new().await;

    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/admin/coupons",
            Some(json!({ "code": "SAVE10", "discount_percent": "10" })),
        )
        .await;
    assert_eq!(response.status(), 403);
}

// ==================== Applying Codes ====================

#[tokio::test]
async fn applying_requires_a_signed_in_shopper() {
    let app = TestApp::new().await;
    app.seed_coupon(percent_coupon("SAVE10", dec!(10))).await;
    let session = session_with_items(&app, 1).await;

    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "SAVE10" })),
            None,
            &session,
        )
        .await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn a_valid_code_discounts_the_quote() {
    let app = TestApp::new().await;
    app.seed_coupon(percent_coupon("SAVE10", dec!(10))).await;
    let session = session_with_items(&app, 2).await;

    // Codes match regardless of case
    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "save10" })),
            Some(app.customer_token()),
            &session,
        )
        .await;
    assert_eq!(response.status(), 200);
    let quote = response_json(response).await;
    assert_eq!(quote["success"], true);
    assert_eq!(money(&quote["subtotal"]), dec!(1500));
    assert_eq!(money(&quote["discount_amount"]), dec!(150));
    assert_eq!(money(&quote["grand_total"]), dec!(1350));

    // The cart view now carries the code
    let response = app
        .request_with_session(Method::GET, "/api/v1/cart", None, None, &session)
        .await;
    let cart = response_json(response).await;
    assert_eq!(cart["coupon_code"], "SAVE10");
}

#[tokio::test]
async fn removing_the_code_restores_the_quote() {
    let app = TestApp::new().await;
    app.seed_coupon(percent_coupon("SAVE10", dec!(10))).await;
    let session = session_with_items(&app, 2).await;

    app.request_with_session(
        Method::POST,
        "/api/v1/coupons/apply",
        Some(json!({ "code": "SAVE10" })),
        Some(app.customer_token()),
        &session,
    )
    .await;

    let response = app
        .request_with_session(Method::POST, "/api/v1/coupons/remove", None, None, &session)
        .await;
    assert_eq!(response.status(), 200);
    let quote = response_json(response).await;
    assert_eq!(money(&quote["discount_amount"]), Decimal::ZERO);
    assert_eq!(money(&quote["grand_total"]), dec!(1500));

    let response = app
        .request_with_session(Method::GET, "/api/v1/cart", None, None, &session)
        .await;
    let cart = response_json(response).await;
    assert!(cart["coupon_code"].is_null());
}

#[tokio::test]
async fn the_discount_cap_clamps_large_discounts() {
    let app = TestApp::new().await;
    let mut input = percent_coupon("HALF", dec!(50));
    input.max_discount_amount = Some(dec!(100));
    app.seed_coupon(input).await;
    let session = session_with_items(&app, 2).await;

    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "HALF" })),
            Some(app.customer_token()),
            &session,
        )
        .await;
    assert_eq!(response.status(), 200);
    let quote = response_json(response).await;

    // 50% of 1500 would be 750; the cap holds it at 100
    assert_eq!(money(&quote["discount_amount"]), dec!(100));
    assert_eq!(money(&quote["grand_total"]), dec!(1400));
}

// ==================== Rejection Reasons ====================

#[tokio::test]
async fn unknown_codes_are_rejected() {
    let app = TestApp::new().await;
    let session = session_with_items(&app, 1).await;

    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "NOSUCH" })),
            Some(app.customer_token()),
            &session,
        )
        .await;
    assert_eq!(response.status(), 422);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Coupon code not found");
}

#[tokio::test]
async fn an_empty_cart_cannot_hold_a_coupon() {
    let app = TestApp::new().await;
    app.seed_coupon(percent_coupon("SAVE10", dec!(10))).await;
    let session = TestApp::new_session_id();

    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "SAVE10" })),
            Some(app.customer_token()),
            &session,
        )
        .await;
    assert_eq!(response.status(), 422);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Add items to your cart before applying a coupon");
}

#[tokio::test]
async fn inactive_and_expired_codes_are_rejected() {
    let app = TestApp::new().await;

    let mut inactive = percent_coupon("PAUSED", dec!(10));
    inactive.is_active = Some(false);
    app.seed_coupon(inactive).await;

    let mut expired = percent_coupon("BYGONE", dec!(10));
    expired.expires_at = Some(Utc::now() - Duration::hours(1));
    app.seed_coupon(expired).await;

    let session = session_with_items(&app, 1).await;

    for code in ["PAUSED", "BYGONE"] {
        let response = app
            .request_with_session(
                Method::POST,
                "/api/v1/coupons/apply",
                Some(json!({ "code": code })),
                Some(app.customer_token()),
                &session,
            )
            .await;
        assert_eq!(response.status(), 422, "code {} should be rejected", code);
    }
}

#[tokio::test]
async fn a_used_up_coupon_is_rejected_at_apply_time() {
    let app = TestApp::new().await;
    app.seed_delivery_option("dhaka", "Inside Dhaka", dec!(60)).await;
    let mut input = percent_coupon("LASTONE", dec!(10));
    input.max_total_uses = Some(1);
    app.seed_coupon(input).await;

    // First shopper burns the single use
    let session = session_with_items(&app, 1).await;
    app.request_with_session(
        Method::POST,
        "/api/v1/coupons/apply",
        Some(json!({ "code": "LASTONE" })),
        Some(app.customer_token()),
        &session,
    )
    .await;
    app.request_with_session(
        Method::PUT,
        "/api/v1/cart/delivery",
        Some(json!({ "key": "dhaka" })),
        None,
        &session,
    )
    .await;
    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "customer_name": "Rahim Uddin",
                "shipping_address": "House 7, Road 3, Dhanmondi, Dhaka",
                "phone": "01712345678",
                "payment_method": "cash"
            })),
            Some(app.customer_token()),
            &session,
        )
        .await;
    assert_eq!(response.status(), 201);

    // The next shopper is turned away before checkout
    let session = session_with_items(&app, 1).await;
    let response = app
        .request_with_session(
            Method::POST,
            "/api/v1/coupons/apply",
            Some(json!({ "code": "LASTONE" })),
            Some(app.admin_token()),
            &session,
        )
        .await;
    assert_eq!(response.status(), 422);
}

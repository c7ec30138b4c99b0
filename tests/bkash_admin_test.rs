//! Integration tests for receiving bKash numbers.
//!
//! Tests cover:
//! - Number format validation
//! - The single-active-number rule
//! - Deletion
//! - Authorization on the admin surface

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

// ==================== Registration ====================

#[tokio::test]
async fn new_numbers_start_inactive() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/bkash-numbers",
            Some(json!({ "number": "01712345678" })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let number = response_json(response).await;
    assert_eq!(number["number"], "01712345678");
    assert_eq!(number["is_active"], false);
}

#[tokio::test]
async fn malformed_numbers_are_rejected() {
    let app = TestApp::new().await;

    for bad in ["017123", "02123456789", "0171234567a", "+8801712345678"] {
        let response = app
            .request_as_admin(
                Method::POST,
                "/api/v1/admin/bkash-numbers",
                Some(json!({ "number": bad })),
            )
            .await;
        assert_eq!(response.status(), 400, "number {} should be rejected", bad);
        let body = response_json(response).await;
        assert_eq!(body["message"], "Number must be 11 digits starting with 01");
    }
}

#[tokio::test]
async fn duplicate_numbers_are_rejected() {
    let app = TestApp::new().await;

    let payload = json!({ "number": "01712345678" });
    let response = app
        .request_as_admin(Method::POST, "/api/v1/admin/bkash-numbers", Some(payload.clone()))
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request_as_admin(Method::POST, "/api/v1/admin/bkash-numbers", Some(payload))
        .await;
    assert_eq!(response.status(), 409);
}

// ==================== Activation ====================

#[tokio::test]
async fn activating_a_number_deactivates_the_rest() {
    let app = TestApp::new().await;

    let first = app.seed_active_bkash_number("01712345678").await;
    assert!(first.is_active);

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/bkash-numbers",
            Some(json!({ "number": "01898765432" })),
        )
        .await;
    let second = response_json(response).await;
    let second_id = second["id"].as_str().expect("number id");

    let response = app
        .request_as_admin(
            Method::POST,
            &format!("/api/v1/admin/bkash-numbers/{}/activate", second_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["is_active"], true);

    // Exactly one number is active afterwards
    let response = app
        .request_as_admin(Method::GET, "/api/v1/admin/bkash-numbers", None)
        .await;
    let numbers = response_json(response).await;
    let numbers = numbers.as_array().expect("number array");
    assert_eq!(numbers.len(), 2);
    let active: Vec<&Value> = numbers
        .iter()
        .filter(|n| n["is_active"] == true)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["number"], "01898765432");
}

#[tokio::test]
async fn activating_a_missing_number_is_a_404() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            &format!("/api/v1/admin/bkash-numbers/{}/activate", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

// ==================== Deletion ====================

#[tokio::test]
async fn numbers_can_be_deleted() {
    let app = TestApp::new().await;
    let number = app.seed_active_bkash_number("01712345678").await;

    let uri = format!("/api/v1/admin/bkash-numbers/{}", number.id);
    let response = app.request_as_admin(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), 204);

    let response = app.request_as_admin(Method::DELETE, &uri, None).await;
    assert_eq!(response.status(), 404);

    let response = app
        .request_as_admin(Method::GET, "/api/v1/admin/bkash-numbers", None)
        .await;
    let numbers = response_json(response).await;
    assert_eq!(numbers.as_array().expect("number array").len(), 0);
}

// ==================== Authorization ====================

#[tokio::test]
async fn the_number_registry_is_admin_only() {
    let app = TestApp::new().await;

    let response = app
        .request_as_customer(Method::GET, "/api/v1/admin/bkash-numbers", None)
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .request(
            Method::POST,
            "/api/v1/admin/bkash-numbers",
            Some(json!({ "number": "01712345678" })),
            None,
        )
        .await;
    assert_eq!(response.status(), 401);
}

//! Integration tests for the blog.
//!
//! Tests cover:
//! - Draft/published visibility on the storefront and in the back office
//! - Slug generation, deduplication and explicit overrides
//! - The publish flow
//! - Authorization on the admin surface

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

async fn create_post(app: &TestApp, payload: Value) -> Value {
    let response = app
        .request_as_admin(Method::POST, "/api/v1/admin/blog", Some(payload))
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

// ==================== Visibility ====================

#[tokio::test]
async fn drafts_stay_out_of_the_storefront() {
    let app = TestApp::new().await;

    let draft = create_post(
        &app,
        json!({ "title": "Monsoon Sale Preview", "body": "Coming soon." }),
    )
    .await;
    assert_eq!(draft["published"], false);
    let slug = draft["slug"].as_str().expect("slug");

    let response = app.request(Method::GET, "/api/v1/blog", None, None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().expect("post data array").len(), 0);

    let response = app
        .request(Method::GET, &format!("/api/v1/blog/{}", slug), None, None)
        .await;
    assert_eq!(response.status(), 404);

    // The back office sees the draft by id
    let id = draft["id"].as_str().expect("post id");
    let response = app
        .request_as_admin(Method::GET, &format!("/api/v1/admin/blog/{}", id), None)
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn publishing_puts_the_post_on_the_storefront() {
    let app = TestApp::new().await;

    let draft = create_post(
        &app,
        json!({ "title": "Monsoon Sale Preview", "body": "Coming soon." }),
    )
    .await;
    let id = draft["id"].as_str().expect("post id");

    let response = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/blog/{}", id),
            Some(json!({ "published": true })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/api/v1/blog/monsoon-sale-preview", None, None)
        .await;
    assert_eq!(response.status(), 200);
    let post = response_json(response).await;
    assert_eq!(post["title"], "Monsoon Sale Preview");
    assert_eq!(post["body"], "Coming soon.");

    let response = app.request(Method::GET, "/api/v1/blog", None, None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().expect("post data array").len(), 1);
}

// ==================== Slugs ====================

#[tokio::test]
async fn slugs_are_generated_from_the_title() {
    let app = TestApp::new().await;

    let post = create_post(
        &app,
        json!({ "title": "Eid Collection 2026!", "body": "...", "published": true }),
    )
    .await;
    assert_eq!(post["slug"], "eid-collection-2026");
}

#[tokio::test]
async fn duplicate_titles_get_numbered_slugs() {
    let app = TestApp::new().await;

    let first = create_post(&app, json!({ "title": "Weekly Picks", "body": "one" })).await;
    let second = create_post(&app, json!({ "title": "Weekly Picks", "body": "two" })).await;
    let third = create_post(&app, json!({ "title": "Weekly Picks", "body": "three" })).await;

    assert_eq!(first["slug"], "weekly-picks");
    assert_eq!(second["slug"], "weekly-picks-2");
    assert_eq!(third["slug"], "weekly-picks-3");
}

#[tokio::test]
async fn an_explicit_slug_wins_and_is_normalized() {
    let app = TestApp::new().await;

    let post = create_post(&app, json!({ "title": "Weekly Picks", "body": "..." })).await;
    let id = post["id"].as_str().expect("post id");

    let response = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/blog/{}", id),
            Some(json!({ "slug": "  Best Of The Week! " })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["slug"], "best-of-the-week");
}

#[tokio::test]
async fn a_title_change_regenerates_the_slug() {
    let app = TestApp::new().await;

    let post = create_post(&app, json!({ "title": "Weekly Picks", "body": "..." })).await;
    let id = post["id"].as_str().expect("post id");

    let response = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/blog/{}", id),
            Some(json!({ "title": "Monthly Picks" })),
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["slug"], "monthly-picks");

    // Updating the body alone leaves the slug in place
    let response = app
        .request_as_admin(
            Method::PUT,
            &format!("/api/v1/admin/blog/{}", id),
            Some(json!({ "body": "refreshed" })),
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["slug"], "monthly-picks");
}

// ==================== Validation and Lifecycle ====================

#[tokio::test]
async fn an_empty_title_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_as_admin(
            Method::POST,
            "/api/v1/admin/blog",
            Some(json!({ "title": "   ", "body": "..." })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn posts_can_be_deleted() {
    let app = TestApp::new().await;

    let post = create_post(
        &app,
        json!({ "title": "Weekly Picks", "body": "...", "published": true }),
    )
    .await;
    let id = post["id"].as_str().expect("post id");

    let response = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/blog/{}", id), None)
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(Method::GET, "/api/v1/blog/weekly-picks", None, None)
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request_as_admin(Method::DELETE, &format!("/api/v1/admin/blog/{}", id), None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn the_blog_back_office_is_admin_only() {
    let app = TestApp::new().await;

    let response = app
        .request_as_customer(
            Method::POST,
            "/api/v1/admin/blog",
            Some(json!({ "title": "Weekly Picks", "body": "..." })),
        )
        .await;
    assert_eq!(response.status(), 403);

    let response = app.request_as_customer(Method::GET, "/api/v1/admin/blog", None).await;
    assert_eq!(response.status(), 403);
}

//! SoBuy API Library
//!
//! This crate provides the core functionality for the SoBuy storefront API
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod mailer;
pub mod middleware_helpers;
pub mod migrator;
pub mod pricing;
pub mod services;
pub mod session;
pub mod slug;
pub mod tracing;

use axum::{extract::State, http::HeaderValue, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Hard ceiling on request handling; requests that exceed it get a 408
/// instead of holding the connection open.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub services: handlers::AppServices,
}

/// All versioned API routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(api_status))
        // Storefront
        .nest("/products", handlers::products::products_routes())
        .nest("/cart", handlers::cart::cart_routes())
        .nest("/delivery-options", handlers::delivery::delivery_routes())
        .nest("/coupons", handlers::coupons::coupon_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/orders", handlers::orders::orders_routes())
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/blog", handlers::blog::blog_routes())
        // Back office
        .nest("/admin/dashboard", handlers::dashboard::admin_dashboard_routes())
        .nest("/admin/products", handlers::products::admin_products_routes())
        .nest("/admin/orders", handlers::orders::admin_orders_routes())
        .nest("/admin/coupons", handlers::coupons::admin_coupons_routes())
        .nest(
            "/admin/delivery-options",
            handlers::delivery::admin_delivery_routes(),
        )
        .nest("/admin/blog", handlers::blog::admin_blog_routes())
        .nest("/admin/bkash-numbers", handlers::bkash::admin_bkash_routes())
}

/// Assembles the complete application with middleware
pub fn app(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(tracing::RequestSpanMaker))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    if config.has_cors_allowed_origins() {
        let origins: Vec<HeaderValue> = config
            .cors_origins()
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(%origin, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn api_status() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    Json(json!({
        "status": "ok",
        "version": version,
        "service": "sobuy-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let session_backend = if state.config.redis_url().is_some() {
        "redis"
    } else {
        "memory"
    };

    Json(json!({
        "status": if db_status == "healthy" { "healthy" } else { "unhealthy" },
        "checks": {
            "database": db_status,
            "sessions": session_backend,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

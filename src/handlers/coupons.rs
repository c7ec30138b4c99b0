use crate::handlers::common::{
    created_response, no_content_response, success_response, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::{AdminUser, AuthUser},
    errors::ApiError,
    services::coupons::{CreateCouponInput, UpdateCouponInput},
    session::SessionId,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Storefront coupon endpoints. Applying requires a signed-in user because
/// the per-user usage cap is checked against their history.
pub fn coupon_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/apply", post(apply_coupon))
        .route("/remove", post(remove_coupon))
}

/// Admin coupon management
pub fn admin_coupons_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_coupons))
        .route("/", post(create_coupon))
        .route("/{id}", put(update_coupon))
        .route("/{id}", delete(delete_coupon))
}

/// Validate a code against the current cart and store it in the session
async fn apply_coupon(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    session: SessionId,
    Json(payload): Json<ApplyCouponRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let quote = state
        .services
        .coupons
        .apply(session.as_str(), user.user_id, &payload.code)
        .await?;
    Ok(success_response(quote))
}

/// Drop the session's coupon and requote
async fn remove_coupon(
    State(state): State<Arc<AppState>>,
    session: SessionId,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let quote = state.services.coupons.remove(session.as_str()).await?;
    Ok(success_response(quote))
}

async fn list_coupons(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (coupons, total) = state
        .services
        .coupons
        .list_coupons(pagination.page(), pagination.per_page())
        .await?;

    Ok(success_response(PaginatedResponse::new(
        coupons,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

async fn create_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateCouponInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let coupon = state.services.coupons.create_coupon(payload).await?;
    Ok(created_response(coupon))
}

async fn update_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCouponInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let coupon = state.services.coupons.update_coupon(id, payload).await?;
    Ok(success_response(coupon))
}

async fn delete_coupon(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.coupons.delete_coupon(id).await?;
    Ok(no_content_response())
}

#[derive(Debug, Deserialize)]
struct ApplyCouponRequest {
    code: String,
}

use crate::handlers::common::{success_response, PaginatedResponse, PaginationParams};
use crate::{
    auth::{AdminUser, AuthUser},
    entities::order::OrderStatus,
    errors::ApiError,
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Order history for the signed-in shopper
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/{id}", get(get_my_order))
}

/// Admin order management
pub fn admin_orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_orders))
        .route("/{id}", get(admin_get_order))
        .route("/{id}/status", put(update_order_status))
}

async fn list_my_orders(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (orders, total) = state
        .services
        .orders
        .list_for_user(user.user_id, pagination.page(), pagination.per_page())
        .await?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

/// Get one of the shopper's own orders with its line items
async fn get_my_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state.services.orders.get_for_user(user.user_id, id).await?;
    Ok(success_response(order))
}

/// List orders across all customers, optionally filtered by status
async fn admin_list_orders(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
    Query(filter): Query<OrderStatusFilter>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let status = filter
        .status
        .as_deref()
        .map(|s| {
            OrderStatus::from_str(s.trim())
                .map_err(|_| ApiError::ValidationError(format!("Unknown order status {}", s)))
        })
        .transpose()?;

    let (orders, total) = state
        .services
        .orders
        .admin_list(pagination.page(), pagination.per_page(), status)
        .await?;

    Ok(success_response(PaginatedResponse::new(
        orders,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

async fn admin_get_order(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state.services.orders.admin_get(id).await?;
    Ok(success_response(order))
}

/// Move an order to a new lifecycle status
async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(id, &payload.status)
        .await?;
    Ok(success_response(order))
}

#[derive(Debug, Deserialize)]
struct OrderStatusFilter {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateOrderStatusRequest {
    status: String,
}

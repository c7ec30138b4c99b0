use crate::handlers::common::success_response;
use crate::{
    errors::ApiError, services::cart::AddToCartInput, session::SessionId, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Session cart endpoints. The cart lives in the session store keyed by the
/// x-session-id header, so none of these require authentication.
pub fn cart_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(view_cart))
        .route("/", delete(clear_cart))
        .route("/items", post(add_to_cart))
        .route("/items/{key}", put(update_cart_item))
        .route("/items/{key}", delete(remove_cart_item))
        .route("/delivery", put(set_delivery))
        .route("/delivery", delete(clear_delivery))
}

/// View the cart with live prices and the current quote
async fn view_cart(
    State(state): State<Arc<AppState>>,
    session: SessionId,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state.services.cart.view(session.as_str()).await?;
    Ok(success_response(view))
}

/// Add a product, merging quantity into an existing line for the same
/// product and color
async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state.services.cart.add(session.as_str(), payload).await?;
    Ok(success_response(view))
}

/// Set a line's quantity. Zero removes the line.
async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Path(key): Path<String>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state
        .services
        .cart
        .set_quantity(session.as_str(), &key, payload.quantity)
        .await?;
    Ok(success_response(view))
}

/// Remove a cart line
async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Path(key): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state.services.cart.remove(session.as_str(), &key).await?;
    Ok(success_response(view))
}

/// Empty the cart, keeping delivery and coupon selections
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    session: SessionId,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state.services.cart.clear(session.as_str()).await?;
    Ok(success_response(view))
}

/// Choose a delivery option for the session
async fn set_delivery(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Json(payload): Json<SetDeliveryRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state
        .services
        .cart
        .set_delivery(session.as_str(), &payload.key)
        .await?;
    Ok(success_response(view))
}

/// Drop the session's delivery selection
async fn clear_delivery(
    State(state): State<Arc<AppState>>,
    session: SessionId,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let view = state.services.cart.clear_delivery(session.as_str()).await?;
    Ok(success_response(view))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct SetDeliveryRequest {
    key: String,
}

use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::{
    auth::AdminUser,
    errors::ApiError,
    services::delivery::{CreateDeliveryOptionInput, UpdateDeliveryOptionInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Storefront delivery option listing
pub fn delivery_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_options))
}

/// Admin delivery option management
pub fn admin_delivery_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_options))
        .route("/", post(create_option))
        .route("/{id}", put(update_option))
        .route("/{id}", delete(delete_option))
}

/// List delivery options in display order
async fn list_options(
    State(state): State<Arc<AppState>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let options = state.services.delivery.list_options().await?;
    Ok(success_response(options))
}

async fn admin_list_options(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let options = state.services.delivery.list_options().await?;
    Ok(success_response(options))
}

/// Create a delivery option with a unique key
async fn create_option(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateDeliveryOptionInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let option = state.services.delivery.create_option(payload).await?;
    Ok(created_response(option))
}

/// Update a delivery option. The key itself is immutable.
async fn update_option(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryOptionInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let option = state.services.delivery.update_option(id, payload).await?;
    Ok(success_response(option))
}

async fn delete_option(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.delivery.delete_option(id).await?;
    Ok(no_content_response())
}

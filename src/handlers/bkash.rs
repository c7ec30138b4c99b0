use crate::handlers::common::{created_response, no_content_response, success_response};
use crate::{
    auth::AdminUser, errors::ApiError, services::bkash::CreateBkashNumberInput, AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Admin management of receiving bKash numbers. At most one number is
/// active at a time; checkout snapshots whichever is active.
pub fn admin_bkash_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_numbers))
        .route("/", post(create_number))
        .route("/{id}/activate", post(activate_number))
        .route("/{id}", delete(delete_number))
}

async fn list_numbers(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let numbers = state.services.bkash.list_numbers().await?;
    Ok(success_response(numbers))
}

/// Register a number. It starts inactive until explicitly activated.
async fn create_number(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateBkashNumberInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let number = state.services.bkash.create_number(payload).await?;
    Ok(created_response(number))
}

/// Make this the single active number, deactivating the rest
async fn activate_number(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let number = state.services.bkash.activate_number(id).await?;
    Ok(success_response(number))
}

async fn delete_number(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.bkash.delete_number(id).await?;
    Ok(no_content_response())
}

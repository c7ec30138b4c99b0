use crate::handlers::common::{
    created_response, no_content_response, success_response, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AdminUser,
    errors::ApiError,
    services::catalog::{CreateProductInput, UpdateProductInput},
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

/// Storefront catalog endpoints. Only active products are visible here.
pub fn products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_products))
        .route("/{id}", get(get_product))
}

/// Admin catalog endpoints, any status visible
pub fn admin_products_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_products))
        .route("/", post(create_product))
        .route("/{id}", get(admin_get_product))
        .route("/{id}", put(update_product))
        .route("/{id}", delete(delete_product))
        .route("/{id}/images", put(set_product_images))
}

/// List active products, newest first
async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .catalog
        .list_products(pagination.page(), pagination.per_page())
        .await?;

    Ok(success_response(PaginatedResponse::new(
        products,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

/// Get one active product with its images, recording the visit
async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state.services.catalog.get_product(id).await?;
    Ok(success_response(detail))
}

/// List all products regardless of status
async fn admin_list_products(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (products, total) = state
        .services
        .catalog
        .admin_list_products(pagination.page(), pagination.per_page())
        .await?;

    Ok(success_response(PaginatedResponse::new(
        products,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

/// Get one product regardless of status
async fn admin_get_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state.services.catalog.admin_get_product(id).await?;
    Ok(success_response(detail))
}

/// Create a product
async fn create_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state.services.catalog.create_product(payload).await?;
    Ok(created_response(product))
}

/// Partially update a product
async fn update_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state.services.catalog.update_product(id, payload).await?;
    Ok(success_response(product))
}

/// Delete a product
async fn delete_product(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.catalog.delete_product(id).await?;
    Ok(no_content_response())
}

/// Replace the product's image set in the given order
async fn set_product_images(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetProductImagesRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let images = state
        .services
        .catalog
        .set_product_images(id, payload.urls)
        .await?;
    Ok(success_response(images))
}

#[derive(Debug, Deserialize)]
struct SetProductImagesRequest {
    urls: Vec<String>,
}

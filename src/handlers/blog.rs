use crate::handlers::common::{
    created_response, no_content_response, success_response, PaginatedResponse, PaginationParams,
};
use crate::{
    auth::AdminUser,
    errors::ApiError,
    services::blog::{CreatePostInput, UpdatePostInput},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Public blog, addressed by slug
pub fn blog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_posts))
        .route("/{slug}", get(get_post))
}

/// Admin blog management, addressed by id so drafts are reachable
pub fn admin_blog_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(admin_list_posts))
        .route("/", post(create_post))
        .route("/{id}", get(admin_get_post))
        .route("/{id}", put(update_post))
        .route("/{id}", delete(delete_post))
}

async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (posts, total) = state
        .services
        .blog
        .list_published(pagination.page(), pagination.per_page())
        .await?;

    Ok(success_response(PaginatedResponse::new(
        posts,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

/// Fetch a published post by slug
async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let post = state.services.blog.get_by_slug(&slug).await?;
    Ok(success_response(post))
}

async fn admin_list_posts(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (posts, total) = state
        .services
        .blog
        .admin_list(pagination.page(), pagination.per_page())
        .await?;

    Ok(success_response(PaginatedResponse::new(
        posts,
        pagination.page(),
        pagination.per_page(),
        total,
    )))
}

async fn admin_get_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let post = state.services.blog.admin_get(id).await?;
    Ok(success_response(post))
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(payload): Json<CreatePostInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let post = state.services.blog.create_post(payload).await?;
    Ok(created_response(post))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let post = state.services.blog.update_post(id, payload).await?;
    Ok(success_response(post))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.blog.delete_post(id).await?;
    Ok(no_content_response())
}

use crate::handlers::common::success_response;
use crate::{auth::AdminUser, errors::ApiError, AppState};
use axum::{extract::State, routing::get, Router};
use std::sync::Arc;

pub fn admin_dashboard_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(dashboard_summary))
}

/// Back office landing numbers: order and customer counts, revenue,
/// recent orders and the most visited products
async fn dashboard_summary(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let summary = state.services.dashboard.summary().await?;
    Ok(success_response(summary))
}

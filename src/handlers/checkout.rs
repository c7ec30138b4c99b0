use crate::handlers::common::created_response;
use crate::{
    auth::AuthUser, errors::ApiError, services::checkout::PlaceOrderInput, session::SessionId,
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use std::sync::Arc;

pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(place_order))
}

/// Turn the session cart into a durable order. Pricing, coupon claim, order
/// row and items all land in one transaction; the session is reset after.
async fn place_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    session: SessionId,
    Json(payload): Json<PlaceOrderInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state
        .services
        .checkout
        .place_order(session.as_str(), user.user_id, payload)
        .await?;
    Ok(created_response(outcome))
}

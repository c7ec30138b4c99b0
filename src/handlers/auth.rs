use crate::handlers::common::{
    accepted_response, created_response, no_content_response, success_response,
};
use crate::{
    auth::AuthUser,
    errors::ApiError,
    services::users::{
        ChangePasswordInput, LoginInput, SignupRequestInput, SignupVerifyInput, UpdateProfileInput,
    },
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use std::sync::Arc;

/// Account endpoints. Signup is a two step email OTP flow.
pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup/request", post(signup_request))
        .route("/signup/verify", post(signup_verify))
        .route("/login", post(login))
        .route("/me", get(get_profile))
        .route("/me", put(update_profile))
        .route("/change-password", post(change_password))
}

/// Start signup. Reserves nothing yet, just mails a verification code.
async fn signup_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupRequestInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state.services.users.signup_request(payload).await?;
    Ok(accepted_response(json!({
        "message": "Verification code sent"
    })))
}

/// Finish signup with the emailed code. Creates the account and signs the
/// user in.
async fn signup_verify(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupVerifyInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state.services.users.signup_verify(payload).await?;
    Ok(created_response(outcome))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let outcome = state.services.users.login(payload).await?;
    Ok(success_response(outcome))
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state.services.users.get_profile(user.user_id).await?;
    Ok(success_response(profile))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state
        .services
        .users
        .update_profile(user.user_id, payload)
        .await?;
    Ok(success_response(profile))
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .users
        .change_password(user.user_id, payload)
        .await?;
    Ok(no_content_response())
}

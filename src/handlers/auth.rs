use axum::{
    extract::State,
    http::header,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AuthUser, LoginOutcome, LoginRequest, RegisterOutcome, RegisterRequest, TokenResponse},
    errors::ServiceError,
    ApiResponse, AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/guest", post(login_as_guest))
        .route("/logout", post(logout))
        .route("/password-reset", post(request_password_reset))
        .route("/password-reset/confirm", post(confirm_password_reset))
}

/// Routes that need an existing session
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<RegisterOutcome>>, ServiceError> {
    let outcome = state.auth.register(payload).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginOutcome>>, ServiceError> {
    let outcome = state.auth.login(payload).await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Guest mode: limited ordering capability, no identity row
async fn login_as_guest(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<TokenResponse>>, ServiceError> {
    let token = state.auth.login_as_guest()?;
    Ok(Json(ApiResponse::success(token)))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ServiceError::AuthError("Missing bearer token".to_string()))?;
    state.auth.logout(token).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "message": "Successfully logged out" }),
    )))
}

#[derive(Debug, Deserialize)]
struct PasswordResetRequest {
    email: String,
}

async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    state.auth.reset_password(&payload.email).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "message": "If the address has an account, a reset link is on its way"
    }))))
}

#[derive(Debug, Deserialize)]
struct PasswordResetConfirmRequest {
    token: String,
    new_password: String,
}

async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetConfirmRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    state
        .auth
        .confirm_password_reset(&payload.token, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "message": "Password updated" }),
    )))
}

/// Session snapshot mirroring what route gating needs: the identity (if
/// registered), the guest flag, and the derived admin predicate.
#[derive(Debug, Serialize)]
struct MeResponse {
    user: Option<AuthUser>,
    is_guest: bool,
    is_admin: bool,
}

async fn me(auth_user: AuthUser) -> Json<ApiResponse<MeResponse>> {
    let is_guest = auth_user.is_guest;
    let is_admin = auth_user.is_admin();
    let user = if is_guest { None } else { Some(auth_user) };
    Json(ApiResponse::success(MeResponse {
        user,
        is_guest,
        is_admin,
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

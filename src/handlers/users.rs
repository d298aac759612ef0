use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{profile, profile::Role},
    errors::ServiceError,
    services::users::{UpdateProfileInput, UserStats, UserWithAccount},
    ApiResponse, AppState,
};

/// Admin user management
pub fn admin_user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/stats", get(user_stats))
        .route("/{id}", get(get_user))
        .route("/{id}/role", put(update_role))
        .route("/{id}", delete(delete_user))
}

/// Self-service profile surface (registered users)
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile))
        .route("/", put(update_profile))
}

async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserWithAccount>>>, ServiceError> {
    let users = state.services.user.list_users().await?;
    Ok(Json(ApiResponse::success(users)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserWithAccount>>, ServiceError> {
    let user = state.services.user.get_user(id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[derive(Debug, Deserialize)]
struct UpdateRoleRequest {
    role: Role,
}

async fn update_role(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    if id == auth_user.user_id && payload.role != Role::Admin {
        return Err(ServiceError::InvalidOperation(
            "Admins cannot remove their own admin role".to_string(),
        ));
    }

    state.services.user.update_role(id, payload.role).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "message": "Role updated" }),
    )))
}

async fn delete_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    if id == auth_user.user_id {
        return Err(ServiceError::InvalidOperation(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    state.services.user.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn user_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserStats>>, ServiceError> {
    let stats = state.services.user.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<profile::Model>>, ServiceError> {
    let profile_model = state.services.user.profile_for(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(profile_model)))
}

async fn update_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<UpdateProfileInput>,
) -> Result<Json<ApiResponse<profile::Model>>, ServiceError> {
    let profile_model = state
        .services
        .user
        .update_profile(auth_user.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(profile_model)))
}

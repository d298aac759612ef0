use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::review,
    errors::ServiceError,
    handlers::common::validate_input,
    services::reviews::CreateReviewInput,
    ApiResponse, AppState,
};

/// Public review surface: anyone may read, and likes are deliberately
/// unauthenticated with no per-viewer dedup.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reviews))
        .route("/{id}/like", post(like_review))
}

/// Submitting a review needs a registered identity
pub fn review_submit_routes() -> Router<AppState> {
    Router::new().route("/", post(create_review))
}

async fn list_reviews(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<review::Model>>>, ServiceError> {
    let reviews = state.services.review.list().await?;
    Ok(Json(ApiResponse::success(reviews)))
}

async fn create_review(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateReviewInput>,
) -> Result<(StatusCode, Json<ApiResponse<review::Model>>), ServiceError> {
    validate_input(&payload)?;
    let model = state.services.review.create(&auth_user, payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(model))))
}

#[derive(Debug, Serialize)]
struct LikeResponse {
    review_id: Uuid,
    likes: i32,
}

async fn like_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<LikeResponse>>, ServiceError> {
    let likes = state.services.review.like(id).await?;
    Ok(Json(ApiResponse::success(LikeResponse {
        review_id: id,
        likes,
    })))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::carts::CartSummary,
    ApiResponse, AppState,
};

/// Cart endpoints. Any session (guest included) may hold a cart; the
/// client keeps the returned cart id the way the browser kept its cart
/// key.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(open_cart))
        .route("/{id}", get(get_cart))
        .route("/{id}/items", post(add_item))
        .route("/{id}/items/{menu_item_id}", put(update_quantity))
        .route("/{id}/items/{menu_item_id}", delete(remove_item))
        .route("/{id}/clear", post(clear_cart))
}

#[derive(Debug, Deserialize)]
struct OpenCartRequest {
    /// Explicit key for guest sessions; registered sessions default to
    /// their user id, so a refreshed login finds the same cart.
    session_key: Option<String>,
}

async fn open_cart(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<OpenCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartSummary>>), ServiceError> {
    let session_key = match payload.session_key {
        Some(key) => key,
        None if !auth_user.is_guest => auth_user.user_id.to_string(),
        None => format!("guest-{}", Uuid::new_v4()),
    };

    let cart = state.services.cart.get_or_create(&session_key).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(cart))))
}

async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartSummary>>, ServiceError> {
    let cart = state.services.cart.get(id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    menu_item_id: i32,
}

async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<CartSummary>>, ServiceError> {
    let cart = state
        .services
        .cart
        .add_item(id, payload.menu_item_id)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

#[derive(Debug, Deserialize)]
struct UpdateQuantityRequest {
    quantity: i32,
}

async fn update_quantity(
    State(state): State<AppState>,
    Path((id, menu_item_id)): Path<(Uuid, i32)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<Json<ApiResponse<CartSummary>>, ServiceError> {
    let cart = state
        .services
        .cart
        .update_quantity(id, menu_item_id, payload.quantity)
        .await?;
    Ok(Json(ApiResponse::success(cart)))
}

/// Removes one unit of the item, deleting the line at zero
async fn remove_item(
    State(state): State<AppState>,
    Path((id, menu_item_id)): Path<(Uuid, i32)>,
) -> Result<Json<ApiResponse<CartSummary>>, ServiceError> {
    let cart = state.services.cart.remove_item(id, menu_item_id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

async fn clear_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartSummary>>, ServiceError> {
    let cart = state.services.cart.clear(id).await?;
    Ok(Json(ApiResponse::success(cart)))
}

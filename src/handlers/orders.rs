use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::OrderStatus,
    errors::ServiceError,
    handlers::common::validate_input,
    services::orders::{OrderResponse, OrderStats, PlaceOrderInput},
    ApiResponse, AppState, ListQuery, PaginatedResponse,
};

/// Order endpoints for the ordering session (guest or registered)
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(place_order))
        .route("/{id}", get(get_order))
        .route("/{id}", delete(delete_order))
}

/// History needs a registered identity
pub fn order_history_routes() -> Router<AppState> {
    Router::new().route("/mine", get(my_orders))
}

/// Admin order management
pub fn admin_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all_orders))
        .route("/stats", get(order_stats))
        .route("/{id}/status", put(update_order_status))
}

/// Place an order from the current cart snapshot
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderInput,
    responses(
        (status = 201, description = "Order placed; the cart has been cleared", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Empty cart or invalid delivery details", body = crate::errors::ErrorResponse),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn place_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<PlaceOrderInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    validate_input(&payload)?;
    let order = state.services.order.place_order(payload, &auth_user).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.order.get(id).await?;

    // Owners and admins only; guest orders are readable within the guest
    // session that placed them (they share the sentinel id)
    let owns = if auth_user.is_guest {
        order.is_guest
    } else {
        order.user_id == auth_user.user_id
    };
    if !owns && !auth_user.is_admin() {
        return Err(ServiceError::Forbidden(
            "Not your order".to_string(),
        ));
    }

    Ok(Json(ApiResponse::success(order)))
}

pub async fn my_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state
        .services
        .order
        .orders_for_user(auth_user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

pub async fn delete_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.order.delete_order(id, &auth_user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List every order, newest first (admin)
#[utoipa::path(
    get,
    path = "/api/v1/admin/orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
    ),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let (orders, total) = state
        .services
        .order
        .all_orders(query.page, query.limit)
        .await?;
    let total_pages = total.div_ceil(query.limit.max(1));

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: orders,
        total,
        page: query.page,
        limit: query.limit,
        total_pages,
    })))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[schema(value_type = String)]
    pub status: OrderStatus,
}

/// Apply a status transition (admin). Illegal transitions are rejected.
#[utoipa::path(
    put,
    path = "/api/v1/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Illegal status transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .order_status
        .update_status(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

pub async fn order_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<OrderStats>>, ServiceError> {
    let stats = state.services.order.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

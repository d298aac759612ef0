use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    entities::menu_item::{self, Category, ItemType},
    errors::ServiceError,
    handlers::common::validate_input,
    services::catalog::{CreateMenuItemInput, MenuFilter, UpdateMenuItemInput},
    ApiResponse, AppState,
};

/// Public read-only menu surface
pub fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_menu))
        .route("/{id}", get(get_menu_item))
}

/// Admin catalog management
pub fn admin_menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_menu_item))
        .route("/{id}", put(update_menu_item))
        .route("/{id}", delete(delete_menu_item))
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MenuItemResponse {
    pub id: i32,
    pub name: String,
    #[schema(value_type = String)]
    pub category: Category,
    pub price: Decimal,
    #[schema(value_type = String)]
    pub item_type: ItemType,
    pub rating: f32,
    pub prep_time: String,
    pub description: String,
    pub is_special: bool,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<menu_item::Model> for MenuItemResponse {
    fn from(model: menu_item::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category: model.category,
            price: model.price,
            item_type: model.item_type,
            rating: model.rating,
            prep_time: model.prep_time,
            description: model.description,
            is_special: model.is_special,
            image_url: model.image_url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// List menu items with optional category/type/special filters
#[utoipa::path(
    get,
    path = "/api/v1/menu",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("item_type" = Option<String>, Query, description = "Filter by Veg/Non-Veg"),
        ("specials_only" = Option<bool>, Query, description = "Today's specials only"),
    ),
    responses(
        (status = 200, description = "Menu items retrieved successfully", body = ApiResponse<Vec<MenuItemResponse>>),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_menu(
    State(state): State<AppState>,
    Query(filter): Query<MenuFilter>,
) -> Result<Json<ApiResponse<Vec<MenuItemResponse>>>, ServiceError> {
    let items = state.services.catalog.list(filter).await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(Into::into).collect(),
    )))
}

/// Get a single menu item
#[utoipa::path(
    get,
    path = "/api/v1/menu/{id}",
    params(("id" = i32, Path, description = "Menu item id")),
    responses(
        (status = 200, description = "Menu item retrieved successfully", body = ApiResponse<MenuItemResponse>),
        (status = 404, description = "Menu item not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_menu_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MenuItemResponse>>, ServiceError> {
    let item = state.services.catalog.get(id).await?;
    Ok(Json(ApiResponse::success(item.into())))
}

pub async fn create_menu_item(
    State(state): State<AppState>,
    Json(payload): Json<CreateMenuItemInput>,
) -> Result<(StatusCode, Json<ApiResponse<MenuItemResponse>>), ServiceError> {
    validate_input(&payload)?;
    let item = state.services.catalog.create(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item.into()))))
}

pub async fn update_menu_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateMenuItemInput>,
) -> Result<Json<ApiResponse<MenuItemResponse>>, ServiceError> {
    validate_input(&payload)?;
    let item = state.services.catalog.update(id, payload).await?;
    Ok(Json(ApiResponse::success(item.into())))
}

pub async fn delete_menu_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    state.services.catalog.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

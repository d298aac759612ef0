use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::errors::ErrorResponse;
use crate::handlers::menu::MenuItemResponse;
use crate::handlers::orders::UpdateOrderStatusRequest;
use crate::services::orders::{OrderResponse, OrderStats, PlaceOrderInput};
use crate::{ApiResponse, PaginatedResponse};

/// OpenAPI description of the documented surface. Served as raw JSON at
/// /api/docs/openapi.json.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "canteen-api",
        description = "College canteen ordering backend: menu, carts, orders, reviews"
    ),
    paths(
        crate::handlers::menu::list_menu,
        crate::handlers::menu::get_menu_item,
        crate::handlers::orders::place_order,
        crate::handlers::orders::list_all_orders,
        crate::handlers::orders::update_order_status,
    ),
    components(schemas(
        MenuItemResponse,
        OrderResponse,
        OrderStats,
        PlaceOrderInput,
        UpdateOrderStatusRequest,
        ErrorResponse,
        ApiResponse<MenuItemResponse>,
        ApiResponse<Vec<MenuItemResponse>>,
        ApiResponse<OrderResponse>,
        ApiResponse<PaginatedResponse<OrderResponse>>,
        PaginatedResponse<OrderResponse>,
    )),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Router serving the OpenAPI document
pub fn docs_routes<S>() -> axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    axum::Router::new().route(
        "/openapi.json",
        axum::routing::get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}

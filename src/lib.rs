//! Canteen API Library
//!
//! Backend for the college canteen: menu catalog, session carts, guest
//! and registered checkout, order administration, and reviews.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;
use crate::entities::profile::Role;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub event_bus: events::EventBus,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Assembles the versioned API surface.
///
/// Gating tiers: public (menu, reviews, auth, health), session (any valid
/// token, guest included), registered-only, and Admin.
pub fn api_v1_routes() -> Router<AppState> {
    // Reachable with no session at all
    let public = Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        .nest("/auth", handlers::auth::auth_routes())
        .nest("/menu", handlers::menu::menu_routes())
        .nest("/reviews", handlers::reviews::review_routes());

    // Any valid session, guest included
    let session = Router::new()
        .nest("/auth", handlers::auth::session_routes())
        .nest("/carts", handlers::carts::cart_routes())
        .nest("/orders", handlers::orders::order_routes())
        .with_auth();

    // Registered identities only
    let registered = Router::new()
        .nest("/orders", handlers::orders::order_history_routes())
        .nest("/reviews", handlers::reviews::review_submit_routes())
        .nest("/profile", handlers::users::profile_routes())
        .with_user();

    // Admin surface
    let admin = Router::new()
        .nest("/admin/orders", handlers::orders::admin_order_routes())
        .nest("/admin/menu", handlers::menu::admin_menu_routes())
        .nest("/admin/users", handlers::users::admin_user_routes())
        .nest("/admin", handlers::stream::stream_routes())
        .with_role(Role::Admin);

    Router::new()
        .merge(public)
        .merge(session)
        .merge(registered)
        .merge(admin)
}

async fn api_status() -> ApiResult<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "service": "canteen-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

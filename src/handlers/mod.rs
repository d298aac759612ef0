pub mod auth;
pub mod carts;
pub mod common;
pub mod menu;
pub mod orders;
pub mod reviews;
pub mod stream;
pub mod users;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<services::CatalogService>,
    pub cart: Arc<services::CartService>,
    pub order: Arc<services::OrderService>,
    pub order_status: Arc<services::OrderStatusService>,
    pub review: Arc<services::ReviewService>,
    pub user: Arc<services::UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let retry = services::reviews::RetryConfig {
            max_attempts: config.review_fetch_attempts,
            delay_step: std::time::Duration::from_millis(config.review_retry_delay_ms),
        };

        Self {
            catalog: Arc::new(services::CatalogService::new(
                db.clone(),
                event_sender.clone(),
            )),
            cart: Arc::new(services::CartService::new(db.clone(), event_sender.clone())),
            order: Arc::new(services::OrderService::new(db.clone(), event_sender.clone())),
            order_status: Arc::new(services::OrderStatusService::new(
                db.clone(),
                event_sender.clone(),
            )),
            review: Arc::new(services::ReviewService::new(
                db.clone(),
                event_sender.clone(),
                retry,
            )),
            user: Arc::new(services::UserService::new(db, event_sender)),
        }
    }
}

use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;
use tempfile::TempDir;
use tokio::sync::mpsc;

use canteen_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::menu_item::{Category, ItemType},
    events::{self, EventBus, EventSender},
    handlers::AppServices,
    services::catalog::CreateMenuItemInput,
    AppState,
};

/// Test harness: application state over a throwaway SQLite database.
pub struct TestApp {
    pub state: AppState,
    #[allow(dead_code)]
    pub auth_service: Arc<AuthService>,
    _tmp: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("temp dir");
        let db_path = tmp.path().join("canteen_test.db");
        let cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "test_secret_key_for_testing_purposes_only_32chars",
        );

        let pool = db::establish_connection(&cfg).await.expect("db connects");
        db::run_migrations(&pool).await.expect("migrations apply");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_bus = EventBus::new(64);
        let event_task = tokio::spawn(events::process_events(event_rx, event_bus.clone()));

        let auth_service = Arc::new(AuthService::new(
            AuthConfig::from_app_config(&cfg),
            db_arc.clone(),
        ));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg);

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            event_bus,
            auth: auth_service.clone(),
            services,
        };

        Self {
            state,
            auth_service,
            _tmp: tmp,
            _event_task: event_task,
        }
    }

    /// The full versioned router, wired the way main() wires it.
    #[allow(dead_code)]
    pub fn router(&self) -> Router {
        let auth_service = self.auth_service.clone();
        Router::new()
            .nest("/api/v1", canteen_api::api_v1_routes())
            .layer(axum::middleware::from_fn_with_state(
                auth_service,
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: axum::extract::Request,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .with_state(self.state.clone())
    }

    /// Seeds one menu item and returns its id.
    #[allow(dead_code)]
    pub async fn seed_menu_item(&self, name: &str, price: Decimal) -> i32 {
        let item = self
            .state
            .services
            .catalog
            .create(CreateMenuItemInput {
                id: None,
                name: name.to_string(),
                category: Category::Breakfast,
                price,
                item_type: ItemType::Veg,
                rating: 4.5,
                prep_time: "10 min".to_string(),
                description: format!("{} from the test kitchen", name),
                is_special: false,
                image_url: String::new(),
            })
            .await
            .expect("menu item seeds");
        item.id
    }
}

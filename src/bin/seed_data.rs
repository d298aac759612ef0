//! Seeds the canteen menu and, optionally, a bootstrap admin account.
//!
//! Usage:
//!   seed-data                 # seed the default menu
//!   seed-data --admin-email a@college.edu --admin-password secret123

use clap::Parser;
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

use canteen_api as api;
use canteen_api::entities::menu_item::{Category, ItemType};
use canteen_api::entities::profile::Role;
use canteen_api::services::catalog::CreateMenuItemInput;

#[derive(Parser, Debug)]
#[command(name = "seed-data", about = "Seed the canteen menu and bootstrap admin")]
struct Args {
    /// Create an admin account with this email
    #[arg(long)]
    admin_email: Option<String>,

    /// Password for the bootstrap admin
    #[arg(long)]
    admin_password: Option<String>,

    /// Wipe existing menu items before seeding
    #[arg(long, default_value_t = false)]
    reset_menu: bool,
}

fn default_menu() -> Vec<CreateMenuItemInput> {
    vec![
        item(1, "Masala Dosa", Category::Breakfast, dec!(45), ItemType::Veg, 4.8, "15 min",
            "Crispy dosa with spiced potato filling and chutneys", true, "/assets/masala-dosa.jpg"),
        item(2, "Chicken Biryani", Category::MainCourse, dec!(120), ItemType::NonVeg, 4.9, "25 min",
            "Aromatic basmati rice with tender chicken and spices", true, "/assets/chicken-biryani.jpg"),
        item(3, "Veg Sandwich", Category::Snacks, dec!(35), ItemType::Veg, 4.6, "8 min",
            "Fresh vegetables with mint chutney in toasted bread", false, "/assets/placeholder.svg"),
        item(4, "Masala Chai", Category::Beverages, dec!(15), ItemType::Veg, 4.7, "5 min",
            "Traditional Indian tea with aromatic spices", false, "/assets/placeholder.svg"),
        item(5, "Paneer Butter Masala", Category::MainCourse, dec!(95), ItemType::Veg, 4.8, "20 min",
            "Rich and creamy paneer curry with butter naan", false, "/assets/placeholder.svg"),
        item(6, "Samosa", Category::Snacks, dec!(20), ItemType::Veg, 4.5, "5 min",
            "Crispy pastry filled with spiced potatoes", false, "/assets/placeholder.svg"),
        item(7, "Mutton Curry", Category::MainCourse, dec!(150), ItemType::NonVeg, 4.7, "30 min",
            "Tender mutton cooked in aromatic spices", true, "/assets/placeholder.svg"),
        item(8, "Idli Sambar", Category::Breakfast, dec!(40), ItemType::Veg, 4.6, "12 min",
            "Steamed rice cakes with lentil curry and coconut chutney", false, "/assets/placeholder.svg"),
    ]
}

#[allow(clippy::too_many_arguments)]
fn item(
    id: i32,
    name: &str,
    category: Category,
    price: rust_decimal::Decimal,
    item_type: ItemType,
    rating: f32,
    prep_time: &str,
    description: &str,
    is_special: bool,
    image_url: &str,
) -> CreateMenuItemInput {
    CreateMenuItemInput {
        id: Some(id),
        name: name.to_string(),
        category,
        price,
        item_type,
        rating,
        prep_time: prep_time.to_string(),
        description: description.to_string(),
        is_special,
        image_url: image_url.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db = Arc::new(api::db::establish_connection(&cfg).await?);
    api::db::run_migrations(&db).await?;

    // Nobody subscribes during seeding; drain the channel
    let (event_tx, mut event_rx) = mpsc::channel(64);
    tokio::spawn(async move { while event_rx.recv().await.is_some() {} });
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));

    let catalog = api::services::CatalogService::new(db.clone(), event_sender.clone());

    if args.reset_menu {
        api::entities::MenuItem::delete_many().exec(&*db).await?;
        info!("Existing menu cleared");
    }

    let mut seeded = 0;
    for input in default_menu() {
        let id = input.id.unwrap_or_default();
        if api::entities::MenuItem::find_by_id(id)
            .one(&*db)
            .await?
            .is_some()
        {
            continue;
        }
        catalog.create(input).await?;
        seeded += 1;
    }
    info!("Seeded {} menu items", seeded);

    if let (Some(email), Some(password)) = (args.admin_email, args.admin_password) {
        let auth =
            api::auth::AuthService::new(api::auth::AuthConfig::from_app_config(&cfg), db.clone());
        let outcome = auth
            .register(api::auth::RegisterRequest {
                full_name: "Canteen Admin".to_string(),
                email,
                phone: "0000000000".to_string(),
                password,
                role: Role::Admin,
                roll_number: None,
                admin_code: Some(cfg.admin_access_code.clone()),
            })
            .await?;
        info!("Bootstrap admin created: {}", outcome.user_id);
    }

    Ok(())
}

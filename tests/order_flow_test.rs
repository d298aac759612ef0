mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

use canteen_api::{
    auth::{AuthUser, GUEST_USER_ID},
    entities::order::{OrderStatus, PaymentMethod, PaymentStatus},
    entities::profile::Role,
    services::orders::PlaceOrderInput,
};

fn guest_session() -> AuthUser {
    AuthUser {
        user_id: GUEST_USER_ID,
        name: Some("Guest".to_string()),
        email: None,
        role: None,
        is_guest: true,
        token_id: Uuid::new_v4().to_string(),
    }
}

fn registered_session(user_id: Uuid, role: Role) -> AuthUser {
    AuthUser {
        user_id,
        name: Some("John Student".to_string()),
        email: Some("student@college.edu".to_string()),
        role: Some(role),
        is_guest: false,
        token_id: Uuid::new_v4().to_string(),
    }
}

fn delivery(cart_id: Uuid, payment: &str) -> PlaceOrderInput {
    PlaceOrderInput {
        cart_id,
        room_number: "H-204".to_string(),
        contact_number: "9876543210".to_string(),
        payment_method: payment.to_string(),
        special_instructions: None,
    }
}

#[tokio::test]
async fn guest_order_snapshot_and_cart_clear() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;
    let chai = app.seed_menu_item("Masala Chai", dec!(15)).await;

    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("guest-1").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");
    cart_service.add_item(cart.id, dosa).await.expect("add");
    let summary = cart_service.add_item(cart.id, chai).await.expect("add");
    let cart_total = summary.total_price;

    let order = app
        .state
        .services
        .order
        .place_order(delivery(cart.id, "cash"), &guest_session())
        .await
        .expect("order places");

    // Guest checkout: cash to hostel room H-204
    assert_eq!(order.user_id, GUEST_USER_ID);
    assert!(order.is_guest);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.payment_method, PaymentMethod::Cash);
    assert_eq!(order.room_number, "H-204");
    assert_eq!(order.total_amount, cart_total);
    assert_eq!(order.total_amount, dec!(105));
    assert!(order.order_number.starts_with("ORD"));

    // The cart is empty immediately after a successful submission
    let after = cart_service.get(cart.id).await.expect("cart reads");
    assert_eq!(after.total_items, 0);
}

#[tokio::test]
async fn snapshot_is_decoupled_from_catalog_edits() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;

    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("s").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    let order = app
        .state
        .services
        .order
        .place_order(delivery(cart.id, "upi"), &guest_session())
        .await
        .expect("order places");

    // Reprice the catalog item after the order exists
    app.state
        .services
        .catalog
        .update(
            dosa,
            canteen_api::services::catalog::UpdateMenuItemInput {
                name: None,
                category: None,
                price: Some(dec!(99)),
                item_type: None,
                rating: None,
                prep_time: None,
                description: None,
                is_special: None,
                image_url: None,
            },
        )
        .await
        .expect("reprice");

    let reread = app.state.services.order.get(order.id).await.expect("read");
    assert_eq!(reread.total_amount, dec!(45));
    assert_eq!(reread.items[0].price, dec!(45));
}

#[tokio::test]
async fn empty_cart_cannot_be_ordered() {
    let app = TestApp::new().await;
    let cart = app
        .state
        .services
        .cart
        .get_or_create("empty")
        .await
        .expect("open");

    let err = app
        .state
        .services
        .order
        .place_order(delivery(cart.id, "cash"), &guest_session())
        .await
        .expect_err("empty cart rejected");
    assert!(err.to_string().contains("empty"));
}

#[tokio::test]
async fn unknown_payment_method_defaults_to_upi() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;
    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("s").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    let order = app
        .state
        .services
        .order
        .place_order(delivery(cart.id, "netbanking"), &guest_session())
        .await
        .expect("order places");
    assert_eq!(order.payment_method, PaymentMethod::Upi);
}

#[tokio::test]
async fn status_machine_enforced_server_side() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;
    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("s").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    let order = app
        .state
        .services
        .order
        .place_order(delivery(cart.id, "cash"), &guest_session())
        .await
        .expect("order places");

    let status_service = &app.state.services.order_status;

    // pending -> completed skips a step and is rejected
    let err = status_service
        .update_status(order.id, OrderStatus::Completed)
        .await
        .expect_err("illegal jump rejected");
    assert!(err.to_string().contains("Cannot transition"));

    // pending -> accepted -> completed is the legal path
    let accepted = status_service
        .update_status(order.id, OrderStatus::Accepted)
        .await
        .expect("accept");
    assert_eq!(accepted.status, OrderStatus::Accepted);

    // Re-accepting an accepted order is a harmless no-op
    let again = status_service
        .update_status(order.id, OrderStatus::Accepted)
        .await
        .expect("no-op accept");
    assert_eq!(again.status, OrderStatus::Accepted);

    let completed = status_service
        .update_status(order.id, OrderStatus::Completed)
        .await
        .expect("complete");
    assert_eq!(completed.status, OrderStatus::Completed);

    // Completed is terminal
    let err = status_service
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .expect_err("terminal state is final");
    assert!(err.to_string().contains("Cannot transition"));
}

#[tokio::test]
async fn owner_history_and_deletion() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;

    let user_id = Uuid::new_v4();
    let owner = registered_session(user_id, Role::Student);

    let cart_service = &app.state.services.cart;
    let cart = cart_service
        .get_or_create(&user_id.to_string())
        .await
        .expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    let order = app
        .state
        .services
        .order
        .place_order(delivery(cart.id, "card"), &owner)
        .await
        .expect("order places");
    assert_eq!(order.user_id, user_id);
    assert!(!order.is_guest);

    let history = app
        .state
        .services
        .order
        .orders_for_user(user_id)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);

    // A different registered user may not delete it
    let stranger = registered_session(Uuid::new_v4(), Role::Student);
    let err = app
        .state
        .services
        .order
        .delete_order(order.id, &stranger)
        .await
        .expect_err("stranger rejected");
    assert!(err.to_string().contains("owner"));

    // The owner may
    app.state
        .services
        .order
        .delete_order(order.id, &owner)
        .await
        .expect("owner deletes");
    let history = app
        .state
        .services
        .order
        .orders_for_user(user_id)
        .await
        .expect("history");
    assert!(history.is_empty());
}

#[tokio::test]
async fn stats_count_by_status_and_revenue() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;
    let cart_service = &app.state.services.cart;

    // Two orders: one completed, one left pending
    for key in ["a", "b"] {
        let cart = cart_service.get_or_create(key).await.expect("open");
        cart_service.add_item(cart.id, dosa).await.expect("add");
        let order = app
            .state
            .services
            .order
            .place_order(delivery(cart.id, "cash"), &guest_session())
            .await
            .expect("order places");
        if key == "a" {
            app.state
                .services
                .order_status
                .update_status(order.id, OrderStatus::Accepted)
                .await
                .expect("accept");
            app.state
                .services
                .order_status
                .update_status(order.id, OrderStatus::Completed)
                .await
                .expect("complete");
        }
    }

    let stats = app.state.services.order.stats().await.expect("stats");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.total_revenue, dec!(45));
    assert_eq!(stats.today_orders, 2);
}

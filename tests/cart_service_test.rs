mod common;

use common::TestApp;
use rust_decimal_macros::dec;

#[tokio::test]
async fn cart_accumulates_and_totals() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;
    let chai = app.seed_menu_item("Masala Chai", dec!(15)).await;

    let cart = app
        .state
        .services
        .cart
        .get_or_create("session-a")
        .await
        .expect("cart opens");
    assert_eq!(cart.total_items, 0);

    let cart_service = &app.state.services.cart;
    cart_service.add_item(cart.id, dosa).await.expect("add dosa");
    cart_service.add_item(cart.id, dosa).await.expect("add dosa again");
    let summary = cart_service.add_item(cart.id, chai).await.expect("add chai");

    assert_eq!(summary.total_items, 3);
    assert_eq!(summary.total_price, dec!(105));
    assert_eq!(summary.items.len(), 2);

    let dosa_line = summary
        .items
        .iter()
        .find(|l| l.menu_item_id == dosa)
        .expect("dosa line exists");
    assert_eq!(dosa_line.quantity, 2);
}

#[tokio::test]
async fn cart_reload_reproduces_items() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;

    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("refresh-me").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    // Same key after a "page refresh" yields the same cart and lines
    let reloaded = cart_service
        .get_or_create("refresh-me")
        .await
        .expect("reload");
    assert_eq!(reloaded.id, cart.id);
    assert_eq!(reloaded.total_items, 2);
    assert_eq!(reloaded.total_price, dec!(90));
}

#[tokio::test]
async fn quantity_zero_removes_the_line() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;

    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("s").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    let summary = cart_service
        .update_quantity(cart.id, dosa, 0)
        .await
        .expect("set zero");
    assert!(summary.items.is_empty());
    assert_eq!(summary.total_items, 0);
}

#[tokio::test]
async fn remove_decrements_then_deletes() {
    let app = TestApp::new().await;
    let dosa = app.seed_menu_item("Masala Dosa", dec!(45)).await;

    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("s").await.expect("open");
    cart_service.add_item(cart.id, dosa).await.expect("add");
    cart_service.add_item(cart.id, dosa).await.expect("add");

    let summary = cart_service.remove_item(cart.id, dosa).await.expect("remove");
    assert_eq!(summary.total_items, 1);

    let summary = cart_service.remove_item(cart.id, dosa).await.expect("remove");
    assert!(summary.items.is_empty());

    // Removing from an empty cart stays a no-op
    let summary = cart_service.remove_item(cart.id, dosa).await.expect("remove");
    assert!(summary.items.is_empty());
}

#[tokio::test]
async fn adding_unknown_menu_item_fails() {
    let app = TestApp::new().await;
    let cart_service = &app.state.services.cart;
    let cart = cart_service.get_or_create("s").await.expect("open");

    let err = cart_service
        .add_item(cart.id, 9999)
        .await
        .expect_err("unknown item rejected");
    assert!(err.to_string().contains("not found"));
}

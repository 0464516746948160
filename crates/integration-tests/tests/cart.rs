//! Integration tests for cart operations across users and checkout.
#![allow(clippy::unwrap_used)]

use rust_decimal::Decimal;

use shopline_core::checkout::DEFAULT_MAX_ORDER_TOTAL;
use shopline_core::{CartLineId, PaymentState, UserId};
use shopline_integration_tests::{ADDRESS, fill_cart, product};
use shopline_storefront::db::{MemoryStore, StockLedger};
use shopline_storefront::services::cart::{CartError, CartService};
use shopline_storefront::services::checkout::{CheckoutError, CheckoutRequest, checkout};

#[tokio::test]
async fn test_removing_absent_line_twice_matches_once() {
    let store = MemoryStore::new();
    let user = UserId::new(1);
    let p = product(&store, "Lamp", 1000, 5).await;
    fill_cart(&store, user, &[(p, 2)]).await;
    let carts = CartService::new(&store);
    let missing = CartLineId::new(9_999);

    let once = carts.remove_line(user, missing).await.unwrap();
    let twice = carts.remove_line(user, missing).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(twice.item_count, 2);
}

#[tokio::test]
async fn test_removing_existing_line_twice_matches_once() {
    let store = MemoryStore::new();
    let user = UserId::new(1);
    let lamp = product(&store, "Lamp", 1000, 5).await;
    let desk = product(&store, "Desk", 9000, 5).await;
    fill_cart(&store, user, &[(lamp, 1), (desk, 1)]).await;
    let carts = CartService::new(&store);
    let line_id = carts.read_cart(user).await.unwrap().lines[0].line_id;

    let once = carts.remove_line(user, line_id).await.unwrap();
    let twice = carts.remove_line(user, line_id).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.lines.len(), 1);
}

#[tokio::test]
async fn test_adding_above_stock_warns_then_checkout_rejects() {
    let store = MemoryStore::new();
    let user = UserId::new(1);
    let p = product(&store, "Lamp", 1000, 1).await;
    let carts = CartService::new(&store);

    let view = carts.add_line(user, p, 4).await.unwrap();
    assert!(view.has_stock_warnings);
    assert!(view.lines[0].exceeds_stock);
    assert_eq!(view.lines[0].available, 1);

    let err = checkout(
        &store,
        user,
        CheckoutRequest {
            shipping_address: ADDRESS.to_string(),
            payment: PaymentState::Unpaid,
        },
        DEFAULT_MAX_ORDER_TOTAL,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CheckoutError::OutOfStock(_)));

    // Restocking clears the warning without touching the cart.
    store
        .restock(p, shopline_core::Quantity::new(5).unwrap())
        .await
        .unwrap();
    assert!(!carts.read_cart(user).await.unwrap().has_stock_warnings);
}

#[tokio::test]
async fn test_users_cannot_touch_each_others_lines() {
    let store = MemoryStore::new();
    let alice = UserId::new(1);
    let bob = UserId::new(2);
    let p = product(&store, "Lamp", 1000, 5).await;
    let carts = CartService::new(&store);
    let line_id = carts.add_line(alice, p, 1).await.unwrap().lines[0].line_id;

    assert!(matches!(
        carts.set_quantity(bob, line_id, 3).await,
        Err(CartError::Forbidden)
    ));
    assert!(matches!(
        carts.remove_line(bob, line_id).await,
        Err(CartError::Forbidden)
    ));
    assert_eq!(carts.read_cart(alice).await.unwrap().item_count, 1);
}

#[tokio::test]
async fn test_cart_subtotal_uses_current_prices() {
    let store = MemoryStore::new();
    let user = UserId::new(1);
    let a = product(&store, "A", 1250, 5).await;
    let b = product(&store, "B", 399, 5).await;
    fill_cart(&store, user, &[(a, 2), (b, 3)]).await;

    let view = CartService::new(&store).read_cart(user).await.unwrap();

    assert_eq!(view.subtotal, Decimal::new(3697, 2));
    assert_eq!(view.item_count, 5);
}

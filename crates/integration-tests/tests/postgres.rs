//! Integration tests against a live `PostgreSQL`.
//!
//! These tests require:
//! - A running `PostgreSQL` database
//! - `STOREFRONT_DATABASE_URL` pointing at it
//!
//! Run with: `cargo test -p shopline-integration-tests -- --ignored`
//!
//! Each test creates its own products and uses random user IDs, so runs do not
//! interfere with each other or with existing data.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::SecretString;
use uuid::Uuid;

use shopline_core::catalog::NewCategory;
use shopline_core::checkout::{DEFAULT_MAX_ORDER_TOTAL, OrderDraft};
use shopline_core::{PaymentState, ProductId, Quantity, ShippingAddress, UserId};
use shopline_integration_tests::{ADDRESS, fill_cart, product};
use shopline_storefront::db::{
    CartStore, CatalogStore, LedgerError, OrderStore, PgStore, PlaceOrderError, StockLedger,
    create_pool,
};
use shopline_storefront::services::catalog::{CatalogCache, listen_for_category_changes};
use shopline_storefront::services::checkout::{CheckoutError, CheckoutRequest, checkout};

async fn store() -> PgStore {
    let url = std::env::var("STOREFRONT_DATABASE_URL")
        .expect("STOREFRONT_DATABASE_URL must be set for PostgreSQL tests");
    let pool = create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to PostgreSQL");
    sqlx::migrate!("../storefront/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    PgStore::new(pool)
}

/// A user ID unlikely to collide with other runs.
fn user() -> UserId {
    let bytes = Uuid::new_v4().as_u128();
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let id = (bytes as u32 & 0x3fff_ffff) as i32;
    UserId::new(id + 1)
}

async fn unique_product(store: &PgStore, cents: i64, stock: i32) -> ProductId {
    product(store, &format!("test-{}", Uuid::new_v4()), cents, stock).await
}

async fn draft_for(store: &PgStore, user: UserId) -> OrderDraft {
    let snapshot = store.load_cart(user).await.unwrap().unwrap();
    OrderDraft::from_snapshot(
        &snapshot,
        ShippingAddress::parse(ADDRESS).unwrap(),
        PaymentState::Unpaid,
        DEFAULT_MAX_ORDER_TOTAL,
    )
    .unwrap()
}

fn request() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: ADDRESS.to_string(),
        payment: PaymentState::Unpaid,
    }
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_conditional_decrement_never_goes_negative() {
    let store = store().await;
    let p = unique_product(&store, 1000, 3).await;

    assert_eq!(
        store.decrement(p, Quantity::new(2).unwrap()).await.unwrap(),
        1
    );
    let err = store
        .decrement(p, Quantity::new(2).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        LedgerError::InsufficientStock {
            requested: 2,
            available: 1,
            ..
        }
    ));
    assert_eq!(store.stock_level(p).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_checkout_commits_order_and_stock() {
    let store = store().await;
    let user = user();
    let a = unique_product(&store, 1000, 5).await;
    let b = unique_product(&store, 500, 5).await;
    fill_cart(&store, user, &[(a, 2), (b, 1)]).await;

    let order_id = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
        .await
        .unwrap();

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.total, Decimal::new(2500, 2));
    assert!(order.total_matches_lines());
    assert_eq!(store.stock_level(a).await.unwrap(), 3);
    assert_eq!(store.stock_level(b).await.unwrap(), 4);
    assert!(store.load_cart(user).await.unwrap().unwrap().lines.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL"]
async fn test_racing_checkouts_never_oversell() {
    let store = store().await;
    let p = unique_product(&store, 1000, 5).await;
    let alice = user();
    let bob = user();
    fill_cart(&store, alice, &[(p, 3)]).await;
    fill_cart(&store, bob, &[(p, 3)]).await;

    let first = tokio::spawn({
        let store = store.clone();
        async move { checkout(&store, alice, request(), DEFAULT_MAX_ORDER_TOTAL).await }
    });
    let second = tokio::spawn({
        let store = store.clone();
        async move { checkout(&store, bob, request(), DEFAULT_MAX_ORDER_TOTAL).await }
    });
    let results = [first.await.unwrap(), second.await.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(CheckoutError::OutOfStock(_))))
            .count(),
        1
    );
    assert_eq!(store.stock_level(p).await.unwrap(), 2);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_shortage_rolls_back_every_line() {
    let store = store().await;
    let user = user();
    let plenty = unique_product(&store, 1000, 10).await;
    let scarce = unique_product(&store, 500, 1).await;
    fill_cart(&store, user, &[(plenty, 2), (scarce, 2)]).await;

    let err = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
        .await
        .unwrap_err();

    let CheckoutError::OutOfStock(shortages) = err else {
        panic!("expected OutOfStock, got {err:?}");
    };
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].product_id, scarce);
    assert_eq!(store.stock_level(plenty).await.unwrap(), 10);
    assert_eq!(store.stock_level(scarce).await.unwrap(), 1);
    assert!(store.list_orders(user).await.unwrap().is_empty());
    assert_eq!(
        store.load_cart(user).await.unwrap().unwrap().lines.len(),
        2
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "Requires running PostgreSQL"]
async fn test_opposite_line_order_checkouts_both_commit() {
    let store = store().await;
    let a = unique_product(&store, 1000, 100).await;
    let b = unique_product(&store, 500, 100).await;

    for _ in 0..20 {
        let alice = user();
        let bob = user();
        fill_cart(&store, alice, &[(a, 1), (b, 1)]).await;
        fill_cart(&store, bob, &[(b, 1), (a, 1)]).await;

        let first = tokio::spawn({
            let store = store.clone();
            async move { checkout(&store, alice, request(), DEFAULT_MAX_ORDER_TOTAL).await }
        });
        let second = tokio::spawn({
            let store = store.clone();
            async move { checkout(&store, bob, request(), DEFAULT_MAX_ORDER_TOTAL).await }
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
    }

    assert_eq!(store.stock_level(a).await.unwrap(), 60);
    assert_eq!(store.stock_level(b).await.unwrap(), 60);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_commit_time_shortage_undoes_earlier_decrements() {
    let store = store().await;
    let user = user();
    let first = unique_product(&store, 1000, 5).await;
    let second = unique_product(&store, 500, 5).await;
    let third = unique_product(&store, 250, 5).await;
    fill_cart(&store, user, &[(first, 2), (second, 2), (third, 2)]).await;
    let draft = draft_for(&store, user).await;

    // A competing sale drains the last line after validation.
    store
        .decrement(third, Quantity::new(4).unwrap())
        .await
        .unwrap();
    let err = store.place_order(&draft).await.unwrap_err();

    let PlaceOrderError::OutOfStock(shortages) = err else {
        panic!("expected OutOfStock, got {err:?}");
    };
    assert_eq!(shortages.len(), 1);
    assert_eq!(shortages[0].product_id, third);
    assert_eq!(shortages[0].available, 1);
    assert_eq!(store.stock_level(first).await.unwrap(), 5);
    assert_eq!(store.stock_level(second).await.unwrap(), 5);
    assert_eq!(store.stock_level(third).await.unwrap(), 1);
    assert!(store.list_orders(user).await.unwrap().is_empty());
    assert_eq!(
        store.load_cart(user).await.unwrap().unwrap().lines.len(),
        3
    );
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_line_added_after_snapshot_is_a_conflict() {
    let store = store().await;
    let user = user();
    let a = unique_product(&store, 1000, 5).await;
    let b = unique_product(&store, 500, 5).await;
    fill_cart(&store, user, &[(a, 1)]).await;
    let draft = draft_for(&store, user).await;

    fill_cart(&store, user, &[(b, 2)]).await;
    let err = store.place_order(&draft).await.unwrap_err();

    assert!(matches!(err, PlaceOrderError::CartChanged));
    assert!(store.list_orders(user).await.unwrap().is_empty());
    assert_eq!(store.stock_level(a).await.unwrap(), 5);
    assert_eq!(
        store.load_cart(user).await.unwrap().unwrap().lines.len(),
        2
    );

    let order_id = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
        .await
        .unwrap();
    assert_eq!(store.get_order(order_id).await.unwrap().unwrap().lines.len(), 2);
    assert!(store.load_cart(user).await.unwrap().unwrap().lines.is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_requantified_line_after_snapshot_is_a_conflict() {
    let store = store().await;
    let user = user();
    let a = unique_product(&store, 1000, 5).await;
    fill_cart(&store, user, &[(a, 1)]).await;
    let draft = draft_for(&store, user).await;

    // Merges into the drafted line, raising it to 3.
    fill_cart(&store, user, &[(a, 2)]).await;
    let err = store.place_order(&draft).await.unwrap_err();

    assert!(matches!(err, PlaceOrderError::CartChanged));
    assert_eq!(store.stock_level(a).await.unwrap(), 5);
    assert!(store.list_orders(user).await.unwrap().is_empty());
    assert_eq!(
        store.load_cart(user).await.unwrap().unwrap().lines[0]
            .quantity
            .get(),
        3
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "Requires running PostgreSQL"]
async fn test_category_write_invalidates_cache() {
    let store = store().await;
    let cache = CatalogCache::new(Duration::from_secs(3600));
    let listener = tokio::spawn({
        let pool = store.pool().clone();
        let cache = cache.clone();
        async move { listen_for_category_changes(&pool, cache).await }
    });
    tokio::time::sleep(Duration::from_millis(500)).await;

    let name = format!("category-{}", Uuid::new_v4());
    cache.categories(&store).await.unwrap();
    store
        .create_category(&NewCategory {
            name: name.clone(),
            description: None,
        })
        .await
        .unwrap();

    let mut seen = false;
    for _ in 0..50 {
        if cache.categories(&store).await.unwrap().iter().any(|c| c.name == name) {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    listener.abort();

    assert!(seen, "cache never picked up {name}");
}

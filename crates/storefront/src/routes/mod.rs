//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (store ping)
//!
//! # Cart (requires sign-in unless noted)
//! GET    /api/cart                  - Priced cart with stock warnings
//! GET    /api/cart/count            - Total units (0 when signed out)
//! POST   /api/cart/lines            - Add product, merging into an existing line
//! PATCH  /api/cart/lines/{line_id}  - Set quantity (< 1 removes)
//! DELETE /api/cart/lines/{line_id}  - Remove line (idempotent)
//! DELETE /api/cart                  - Clear cart
//!
//! # Checkout and orders (requires sign-in)
//! POST   /api/checkout              - Place order, 201 { order_id }
//! GET    /api/orders                - Order history, newest first
//! GET    /api/orders/{order_id}     - One order
//!
//! # Catalog
//! GET    /api/categories            - Category list (cached)
//! ```

pub mod cart;
pub mod categories;
pub mod checkout;
pub mod extract;
pub mod health;
pub mod orders;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::db::Store;
use crate::middleware::{api_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the cart routes router.
pub fn cart_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(cart::show::<S>).delete(cart::clear::<S>))
        .route("/count", get(cart::count::<S>))
        .route("/lines", post(cart::add_line::<S>))
        .route(
            "/lines/{line_id}",
            patch(cart::set_quantity::<S>).delete(cart::remove_line::<S>),
        )
}

/// Create the order routes router.
pub fn order_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(orders::index::<S>))
        .route("/{order_id}", get(orders::show::<S>))
}

fn checkout_routes<S: Store>() -> Router<AppState<S>> {
    Router::new().route("/checkout", post(checkout::create::<S>))
}

fn api_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .route("/categories", get(categories::index::<S>))
}

fn health_routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness::<S>))
}

/// Create all routes for the storefront, without rate limiting.
pub fn routes<S: Store>() -> Router<AppState<S>> {
    Router::new()
        .merge(health_routes())
        .nest("/api", api_routes().merge(checkout_routes()))
}

/// Create all routes with per-IP rate limits on the API.
///
/// The server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the limiter can
/// fall back to the peer address.
pub fn rate_limited_routes<S: Store>() -> Router<AppState<S>> {
    let api = api_routes::<S>()
        .layer(api_rate_limiter())
        .merge(checkout_routes::<S>().layer(checkout_rate_limiter()));

    Router::new().merge(health_routes()).nest("/api", api)
}

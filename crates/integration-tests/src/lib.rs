//! Integration tests for Shopline.
//!
//! # Running Tests
//!
//! ```bash
//! # In-memory tests
//! cargo test -p shopline-integration-tests
//!
//! # Including PostgreSQL-backed tests
//! STOREFRONT_DATABASE_URL=postgres://... cargo test -p shopline-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `checkout` - Stock, atomicity and total properties of the checkout
//! - `cart` - Cart store behaviour through the services
//! - `cart_client` - The client cache against a live storefront
//! - `postgres` - The same properties against `PostgreSQL` (ignored by default)
//!
//! This library holds the shared fixtures.

use std::net::SocketAddr;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::post;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_sessions::Session;
use url::Url;

use shopline_core::catalog::NewProduct;
use shopline_core::{Price, ProductId, Quantity, UserId};
use shopline_storefront::config::StorefrontConfig;
use shopline_storefront::db::{CartStore, CatalogStore, MemoryStore};
use shopline_storefront::middleware::{session_layer, set_current_user};
use shopline_storefront::models::CurrentUser;
use shopline_storefront::routes::routes;
use shopline_storefront::state::AppState;

/// Shipping address accepted by checkout.
pub const ADDRESS: &str = "123 Main St";

/// Create a product and return its ID.
///
/// # Panics
///
/// Panics if the store rejects the product.
pub async fn product<S: CatalogStore>(store: &S, name: &str, cents: i64, stock: i32) -> ProductId {
    store
        .create_product(&NewProduct {
            category_id: None,
            name: name.to_string(),
            price: Price::new(Decimal::new(cents, 2)).expect("non-negative price"),
            stock,
        })
        .await
        .expect("Failed to create product")
        .id
}

/// Add `(product, quantity)` lines to a user's cart.
///
/// # Panics
///
/// Panics if a quantity is below 1 or the store rejects a line.
pub async fn fill_cart<S: CartStore>(store: &S, user: UserId, lines: &[(ProductId, i32)]) {
    for &(product_id, quantity) in lines {
        store
            .add_line(
                user,
                product_id,
                Quantity::new(quantity).expect("positive quantity"),
            )
            .await
            .expect("Failed to add cart line");
    }
}

async fn test_login(session: Session, Path(id): Path<i32>) -> StatusCode {
    match set_current_user(&session, &CurrentUser { id: UserId::new(id) }).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A storefront served over TCP on an ephemeral port, backed by a
/// [`MemoryStore`].
///
/// Sign-in is simulated by `POST /test/login/{user_id}`, which stands in for
/// the external authentication service.
pub struct RunningStorefront {
    pub base_url: Url,
    pub store: MemoryStore,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<()>,
}

impl RunningStorefront {
    /// Bind to `127.0.0.1:0` and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let store = MemoryStore::new();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr: SocketAddr = listener.local_addr().expect("listener address");
        let base_url = Url::parse(&format!("http://{addr}/")).expect("valid URL");

        let config = StorefrontConfig::new(
            SecretString::from("postgres://localhost/unused"),
            base_url.clone(),
            SecretString::from("integration-test-session-secret-0123456789"),
        );
        let layer = session_layer(tower_sessions::MemoryStore::default(), &config);
        let state = AppState::new(config, store.clone());

        let router = routes::<MemoryStore>()
            .route("/test/login/{id}", post(test_login))
            .layer(layer)
            .with_state(state);

        let (shutdown, signal) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    signal.await.ok();
                })
                .await
                .ok();
        });

        Self {
            base_url,
            store,
            shutdown,
            server,
        }
    }

    /// Sign in as `user` and return the `Cookie` header value for the session.
    ///
    /// # Panics
    ///
    /// Panics if the login request fails.
    pub async fn login(&self, user: i32) -> String {
        let url = self
            .base_url
            .join(&format!("test/login/{user}"))
            .expect("valid login URL");
        let response = reqwest::Client::new()
            .post(url)
            .send()
            .await
            .expect("login request");
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

        let set_cookie = response
            .headers()
            .get(reqwest::header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .expect("ASCII cookie");
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }

    /// Stop accepting connections and wait for the server task to finish.
    ///
    /// # Panics
    ///
    /// Panics if the server task panicked.
    pub async fn stop(self) {
        self.shutdown.send(()).ok();
        self.server.await.expect("server task");
    }
}

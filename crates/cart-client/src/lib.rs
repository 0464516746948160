//! Shopline Cart Client - client-side cart cache for the storefront API.
//!
//! The cache keeps the user's cart locally so it can be shown immediately,
//! while the storefront stays the source of truth:
//!
//! - Reads are served from the mirror for five minutes after a sync, then go
//!   to the server with bounded linear-backoff retry. If the server stays
//!   unreachable the mirror is shown with a soft warning.
//! - Mutations apply to the mirror immediately, then are confirmed with the
//!   cart the server returns or compensated if the call fails.
//! - The last synced cart is persisted so a returning user sees it at once.
//!   A persisted cart is provisional until the next successful fetch.
//!
//! ```rust,no_run
//! use reqwest::Client;
//! use secrecy::SecretString;
//! use shopline_cart_client::{CartCache, CartCacheConfig, FileSnapshotStore, HttpCartApi};
//! use url::Url;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpCartApi::new(
//!     Client::new(),
//!     Url::parse("https://shop.example.com/")?,
//!     SecretString::from("shopline_session=..."),
//! );
//! let snapshots = FileSnapshotStore::new("cart.json");
//! let mut cart = CartCache::open(api, snapshots, CartCacheConfig::default()).await;
//!
//! cart.fetch().await?;
//! println!("{} items", cart.item_count());
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cache;
pub mod error;
pub mod mirror;
pub mod persist;
pub mod retry;

pub use api::{CartApi, HttpCartApi};
pub use cache::{CartCache, CartCacheConfig, FetchOutcome};
pub use error::{ApiError, CartClientError, PersistError};
pub use mirror::{CartMirror, Compensation, LocalLine, Mutation, ProductRef};
pub use persist::{FileSnapshotStore, MemorySnapshotStore, PersistedCart, SnapshotStore};
pub use retry::RetryPolicy;

//! Storage for the storefront.
//!
//! # Database: `shopline`
//!
//! ## Tables (schema `storefront`)
//!
//! - `category`, `product` - Catalog (read-only here, except `product.stock`)
//! - `cart`, `cart_line` - One cart per user, one line per product
//! - `"order"`, `order_line` - Committed orders with snapshot prices
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Storage seam
//!
//! Services talk to storage through the traits in [`store`]. [`PgStore`] is the
//! production implementation; [`MemoryStore`] backs tests and supports fault
//! injection at each commit stage.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p shopline-cli -- migrate
//! ```

pub mod carts;
pub mod catalog;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod stock;
pub mod store;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use catalog::CatalogRepository;
pub use memory::{CommitStage, MemoryStore};
pub use orders::OrderRepository;
pub use postgres::PgStore;
pub use stock::StockRepository;
pub use store::{
    CartStore, CatalogStore, LedgerError, OrderStore, PlaceOrderError, StockLedger, Store,
};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Entity exists but belongs to another user.
    #[error("forbidden")]
    Forbidden,

    /// Constraint violation (e.g., quantity above the per-line maximum).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a foreign-key violation to `NotFound`, everything else to `Database`.
fn map_fk_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_foreign_key_violation()
    {
        return RepositoryError::NotFound;
    }
    RepositoryError::Database(e)
}

/// Row decode failures mean stored data violates a domain invariant.
fn decode_as_corruption(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::ColumnDecode { index, source } => {
            RepositoryError::DataCorruption(format!("invalid value in column {index}: {source}"))
        }
        other => RepositoryError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_maps_to_corruption() {
        let err = decode_as_corruption(sqlx::Error::ColumnDecode {
            index: "quantity".to_string(),
            source: "quantity must be at least 1, got 0".into(),
        });
        assert!(matches!(err, RepositoryError::DataCorruption(_)));

        let err = decode_as_corruption(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Database(_)));
    }

    #[test]
    fn test_non_database_error_is_not_a_fk_violation() {
        assert!(matches!(
            map_fk_violation(sqlx::Error::RowNotFound),
            RepositoryError::Database(_)
        ));
    }
}

//! Stock ledger for database operations.
//!
//! `product.stock` is only ever changed through [`decrement_stock`] and
//! [`StockRepository::restock`]. The decrement is a single conditional
//! `UPDATE`; there is no read-then-write path.

use sqlx::{PgExecutor, PgPool};
use tracing::instrument;

use shopline_core::{ProductId, Quantity};

use super::store::LedgerError;
use super::RepositoryError;

/// Decrement stock if at least `amount` is available.
///
/// Returns `Some(new_stock)` on success and `None` if the product is missing
/// or has too little stock. Works on a pool or inside a transaction.
pub(crate) async fn decrement_stock<'e>(
    executor: impl PgExecutor<'e>,
    product_id: ProductId,
    amount: Quantity,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar(
        r"
        UPDATE storefront.product
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        RETURNING stock
        ",
    )
    .bind(product_id)
    .bind(amount)
    .fetch_optional(executor)
    .await
}

/// Current stock, or `None` if the product does not exist.
pub(crate) async fn current_stock<'e>(
    executor: impl PgExecutor<'e>,
    product_id: ProductId,
) -> Result<Option<i32>, sqlx::Error> {
    sqlx::query_scalar("SELECT stock FROM storefront.product WHERE id = $1")
        .bind(product_id)
        .fetch_optional(executor)
        .await
}

/// Repository for stock ledger operations.
pub struct StockRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> StockRepository<'a> {
    /// Create a new stock repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Atomically decrement stock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientStock` if less than `amount` is available.
    /// Returns `LedgerError::ProductNotFound` if the product does not exist.
    /// Returns `LedgerError::Repository` for database errors.
    #[instrument(skip(self), fields(product_id = %product_id, amount = %amount))]
    pub async fn decrement(&self, product_id: ProductId, amount: Quantity) -> Result<i32, LedgerError> {
        if let Some(stock) = decrement_stock(self.pool, product_id, amount)
            .await
            .map_err(RepositoryError::from)?
        {
            return Ok(stock);
        }

        // Only for the error report; the UPDATE above already decided.
        let available = current_stock(self.pool, product_id)
            .await
            .map_err(RepositoryError::from)?
            .ok_or(LedgerError::ProductNotFound(product_id))?;

        Err(LedgerError::InsufficientStock {
            product_id,
            requested: amount.get(),
            available,
        })
    }

    /// Add stock.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ProductNotFound` if the product does not exist.
    /// Returns `LedgerError::Repository` for database errors (including overflow).
    #[instrument(skip(self), fields(product_id = %product_id, amount = %amount))]
    pub async fn restock(&self, product_id: ProductId, amount: Quantity) -> Result<i32, LedgerError> {
        let stock: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE storefront.product
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock
            ",
        )
        .bind(product_id)
        .bind(amount)
        .fetch_optional(self.pool)
        .await
        .map_err(RepositoryError::from)?;

        stock.ok_or(LedgerError::ProductNotFound(product_id))
    }

    /// Current stock level.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::ProductNotFound` if the product does not exist.
    /// Returns `LedgerError::Repository` for database errors.
    pub async fn stock_level(&self, product_id: ProductId) -> Result<i32, LedgerError> {
        current_stock(self.pool, product_id)
            .await
            .map_err(RepositoryError::from)?
            .ok_or(LedgerError::ProductNotFound(product_id))
    }
}

//! Add stock through the ledger.
//!
//! ```bash
//! shopline-cli restock --product 12 --amount 40
//! ```

use thiserror::Error;
use tracing::info;

use shopline_core::{ProductId, Quantity, QuantityError};
use shopline_storefront::db::{LedgerError, StockLedger};

use super::{ConnectError, connect};

/// Errors that can occur while restocking.
#[derive(Debug, Error)]
pub enum RestockError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(#[from] QuantityError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Add `amount` units to `product_id`. Returns the new stock level.
///
/// # Errors
///
/// Returns `RestockError::InvalidAmount` if `amount` is below 1 and
/// `RestockError::Ledger` if the product does not exist.
pub async fn restock<S: StockLedger>(
    store: &S,
    product_id: ProductId,
    amount: i32,
) -> Result<i32, RestockError> {
    let amount = Quantity::new(amount)?;
    let before = store.stock_level(product_id).await?;
    let after = store.restock(product_id, amount).await?;

    info!(%product_id, before, after, "Restocked product");
    Ok(after)
}

/// Connect and restock.
///
/// # Errors
///
/// See [`restock`].
pub async fn run(product_id: i32, amount: i32) -> Result<i32, RestockError> {
    // Reject bad input before touching the database
    Quantity::new(amount)?;
    let store = connect().await?;
    restock(&store, ProductId::new(product_id), amount).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopline_core::Price;
    use shopline_core::catalog::NewProduct;
    use shopline_storefront::db::{CatalogStore, MemoryStore};

    use super::*;

    #[tokio::test]
    async fn test_restock_adds_to_stock() {
        let store = MemoryStore::new();
        let product = store
            .create_product(&NewProduct {
                category_id: None,
                name: "Stool".to_string(),
                price: Price::new(Decimal::new(8000, 2)).unwrap(),
                stock: 2,
            })
            .await
            .unwrap();

        assert_eq!(restock(&store, product.id, 5).await.unwrap(), 7);
        assert_eq!(store.stock_level(product.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_restock_rejects_non_positive_amount() {
        let store = MemoryStore::new();
        assert!(matches!(
            restock(&store, ProductId::new(1), 0).await,
            Err(RestockError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_restock_unknown_product() {
        let store = MemoryStore::new();
        assert!(matches!(
            restock(&store, ProductId::new(404), 3).await,
            Err(RestockError::Ledger(LedgerError::ProductNotFound(_)))
        ));
    }
}

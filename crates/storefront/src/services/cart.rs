//! Cart store operations.
//!
//! Wraps [`CartStore`] with input validation and returns the priced
//! [`CartView`] after every mutation. Stock is never checked here.

use thiserror::Error;
use tracing::{debug, instrument};

use shopline_core::cart::CartView;
use shopline_core::{CartLineId, ProductId, Quantity, QuantityError, UserId};

use crate::db::{CartStore, RepositoryError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity outside `1..=Quantity::MAX`.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    /// Merging into an existing line would exceed the per-line maximum.
    #[error("cart line quantity cannot exceed {max}")]
    QuantityLimit { max: i32 },

    #[error("product not found")]
    ProductNotFound,

    #[error("cart line not found")]
    LineNotFound,

    /// The line exists but is in another user's cart.
    #[error("cart line belongs to another user")]
    Forbidden,

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for one storage handle.
pub struct CartService<'a, S> {
    store: &'a S,
}

impl<'a, S: CartStore> CartService<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Read the user's cart with live prices and stock warnings, creating an
    /// empty cart on first access.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn read_cart(&self, user_id: UserId) -> Result<CartView, CartError> {
        self.store.get_or_create_cart(user_id).await?;
        self.current_view(user_id).await
    }

    /// Total units in the user's cart. Zero if there is no cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    pub async fn item_count(&self, user_id: UserId) -> Result<i64, CartError> {
        Ok(self
            .store
            .load_cart(user_id)
            .await?
            .map_or(0, |snapshot| {
                snapshot
                    .lines
                    .iter()
                    .map(|line| i64::from(line.quantity.get()))
                    .sum()
            }))
    }

    /// Add a product to the cart, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity < 1`.
    /// Returns `CartError::QuantityLimit` if the merged line would be too large.
    /// Returns `CartError::ProductNotFound` if the product does not exist.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        let quantity = Quantity::new(quantity)?;

        let line = self
            .store
            .add_line(user_id, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ProductNotFound,
                RepositoryError::Conflict(_) => CartError::QuantityLimit { max: Quantity::MAX },
                other => CartError::Repository(other),
            })?;
        debug!(line_id = %line.id, quantity = %line.quantity, "Cart line added");

        self.current_view(user_id).await
    }

    /// Set a line's quantity. A quantity below 1 removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the line does not exist.
    /// Returns `CartError::Forbidden` if the line is in another user's cart.
    #[instrument(skip(self), fields(user_id = %user_id, line_id = %line_id))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        if quantity < 1 {
            return self.remove_line(user_id, line_id).await;
        }
        let quantity = Quantity::new(quantity)?;

        self.store
            .set_quantity(user_id, line_id, quantity)
            .await
            .map_err(map_line_error)?;

        self.current_view(user_id).await
    }

    /// Remove a line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Forbidden` if the line is in another user's cart.
    #[instrument(skip(self), fields(user_id = %user_id, line_id = %line_id))]
    pub async fn remove_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<CartView, CartError> {
        let removed = self
            .store
            .remove_line(user_id, line_id)
            .await
            .map_err(map_line_error)?;
        if !removed {
            debug!("Cart line already absent");
        }

        self.current_view(user_id).await
    }

    /// Delete every line in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if storage fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, CartError> {
        let removed = self.store.clear_cart(user_id).await?;
        debug!(removed, "Cart cleared");
        Ok(CartView::empty())
    }

    async fn current_view(&self, user_id: UserId) -> Result<CartView, CartError> {
        Ok(self
            .store
            .load_cart(user_id)
            .await?
            .map_or_else(CartView::empty, |snapshot| {
                CartView::from_lines(&snapshot.lines)
            }))
    }
}

fn map_line_error(e: RepositoryError) -> CartError {
    match e {
        RepositoryError::NotFound => CartError::LineNotFound,
        RepositoryError::Forbidden => CartError::Forbidden,
        other => CartError::Repository(other),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;
    use shopline_core::Price;
    use shopline_core::catalog::NewProduct;

    use super::*;
    use crate::db::{CatalogStore, MemoryStore};

    async fn product(store: &MemoryStore, cents: i64, stock: i32) -> ProductId {
        store
            .create_product(&NewProduct {
                category_id: None,
                name: "Widget".to_string(),
                price: Price::new(Decimal::new(cents, 2)).unwrap(),
                stock,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_read_cart_creates_empty_cart() {
        let store = MemoryStore::new();
        let view = CartService::new(&store)
            .read_cart(UserId::new(1))
            .await
            .unwrap();

        assert!(view.is_empty());
        assert!(store.load_cart(UserId::new(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_add_line_accepts_quantity_above_stock_with_warning() {
        let store = MemoryStore::new();
        let p = product(&store, 1000, 2).await;
        let service = CartService::new(&store);

        let view = service.add_line(UserId::new(1), p, 3).await.unwrap();

        assert_eq!(view.lines.len(), 1);
        assert!(view.has_stock_warnings);
        assert_eq!(view.subtotal, Decimal::new(3000, 2));
    }

    #[tokio::test]
    async fn test_add_line_rejects_non_positive_quantity() {
        let store = MemoryStore::new();
        let p = product(&store, 1000, 2).await;
        let service = CartService::new(&store);

        assert!(matches!(
            service.add_line(UserId::new(1), p, 0).await,
            Err(CartError::InvalidQuantity(_))
        ));
        assert!(matches!(
            service.add_line(UserId::new(1), p, -2).await,
            Err(CartError::InvalidQuantity(_))
        ));
    }

    #[tokio::test]
    async fn test_add_line_merged_quantity_limit() {
        let store = MemoryStore::new();
        let p = product(&store, 100, 2).await;
        let service = CartService::new(&store);

        service
            .add_line(UserId::new(1), p, Quantity::MAX)
            .await
            .unwrap();
        assert!(matches!(
            service.add_line(UserId::new(1), p, 1).await,
            Err(CartError::QuantityLimit { .. })
        ));
    }

    #[tokio::test]
    async fn test_add_line_unknown_product() {
        let store = MemoryStore::new();
        assert!(matches!(
            CartService::new(&store)
                .add_line(UserId::new(1), ProductId::new(42), 1)
                .await,
            Err(CartError::ProductNotFound)
        ));
    }

    #[tokio::test]
    async fn test_set_quantity_below_one_removes() {
        let store = MemoryStore::new();
        let p = product(&store, 1000, 5).await;
        let service = CartService::new(&store);
        let user = UserId::new(1);

        let view = service.add_line(user, p, 2).await.unwrap();
        let line_id = view.lines[0].line_id;

        let view = service.set_quantity(user, line_id, 0).await.unwrap();
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_set_quantity_other_users_line_is_forbidden() {
        let store = MemoryStore::new();
        let p = product(&store, 1000, 5).await;
        let service = CartService::new(&store);

        let view = service.add_line(UserId::new(1), p, 2).await.unwrap();
        let line_id = view.lines[0].line_id;

        assert!(matches!(
            service.set_quantity(UserId::new(2), line_id, 5).await,
            Err(CartError::Forbidden)
        ));
        assert!(matches!(
            service.set_quantity(UserId::new(1), CartLineId::new(999), 5).await,
            Err(CartError::LineNotFound)
        ));
    }

    #[tokio::test]
    async fn test_item_count_and_clear() {
        let store = MemoryStore::new();
        let a = product(&store, 1000, 5).await;
        let b = product(&store, 500, 5).await;
        let service = CartService::new(&store);
        let user = UserId::new(1);

        assert_eq!(service.item_count(user).await.unwrap(), 0);
        service.add_line(user, a, 2).await.unwrap();
        service.add_line(user, b, 1).await.unwrap();
        assert_eq!(service.item_count(user).await.unwrap(), 3);

        let view = service.clear(user).await.unwrap();
        assert!(view.is_empty());
        assert_eq!(service.item_count(user).await.unwrap(), 0);
    }
}

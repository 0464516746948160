//! Storage traits.
//!
//! Each trait covers one resource. Implementations must make every method a
//! single atomic step: ownership check, quantity check, and write happen
//! together, and [`OrderStore::place_order`] commits all or nothing.

use std::future::Future;

use shopline_core::cart::{Cart, CartLine, CartSnapshot};
use shopline_core::catalog::{Category, NewCategory, NewProduct, Product};
use shopline_core::checkout::{OrderDraft, StockShortage};
use shopline_core::order::Order;
use shopline_core::{
    CartLineId, CategoryId, OrderId, OrderStatus, ProductId, Quantity, UserId,
};
use thiserror::Error;

use super::RepositoryError;

/// Errors from the stock ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Not enough stock for the requested decrement. Not retryable.
    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The product does not exist.
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Errors from committing an order.
#[derive(Debug, Error)]
pub enum PlaceOrderError {
    /// At least one conditional decrement failed; nothing was committed.
    #[error("{} line(s) ran out of stock during commit", .0.len())]
    OutOfStock(Vec<StockShortage>),

    /// The cart was edited after the snapshot; retrying reads it again.
    #[error("cart changed while checking out")]
    CartChanged,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-user carts and their lines.
pub trait CartStore: Send + Sync {
    /// Get the user's cart, creating an empty one on first access.
    fn get_or_create_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Cart, RepositoryError>> + Send;

    /// Load the user's cart with every line joined to the current product
    /// price and stock. `None` if the user has no cart yet.
    fn load_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<CartSnapshot>, RepositoryError>> + Send;

    /// Add `quantity` of a product, merging into an existing line.
    ///
    /// Stock is not checked. Returns `NotFound` for an unknown product and
    /// `Conflict` if the merged quantity would exceed [`Quantity::MAX`].
    fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartLine, RepositoryError>> + Send;

    /// Set a line's quantity. Returns `NotFound` if the line does not exist
    /// and `Forbidden` if it belongs to another user's cart.
    fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> impl Future<Output = Result<CartLine, RepositoryError>> + Send;

    /// Remove a line. Returns whether a line was deleted; an absent line is
    /// not an error. Returns `Forbidden` if it belongs to another user.
    fn remove_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> impl Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete every line in the user's cart. Returns the number deleted.
    fn clear_cart(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Authoritative stock counts.
pub trait StockLedger: Send + Sync {
    /// Atomically decrement stock if at least `amount` is available.
    /// Returns the new stock level.
    fn decrement(
        &self,
        product_id: ProductId,
        amount: Quantity,
    ) -> impl Future<Output = Result<i32, LedgerError>> + Send;

    /// Add stock. Returns the new stock level.
    fn restock(
        &self,
        product_id: ProductId,
        amount: Quantity,
    ) -> impl Future<Output = Result<i32, LedgerError>> + Send;

    /// Current stock level.
    fn stock_level(
        &self,
        product_id: ProductId,
    ) -> impl Future<Output = Result<i32, LedgerError>> + Send;
}

/// Orders.
pub trait OrderStore: Send + Sync {
    /// Commit a validated draft as one unit of work: insert the order and its
    /// lines, conditionally decrement stock for every line, clear the cart.
    ///
    /// If any decrement fails, every shortage is reported and nothing from
    /// this attempt persists.
    fn place_order(
        &self,
        draft: &OrderDraft,
    ) -> impl Future<Output = Result<OrderId, PlaceOrderError>> + Send;

    /// Get an order with its lines.
    fn get_order(
        &self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<Option<Order>, RepositoryError>> + Send;

    /// All of a user's orders with lines, newest first.
    fn list_orders(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<Order>, RepositoryError>> + Send;

    /// Move an order to `next`. Returns `Conflict` if the lifecycle does not
    /// allow the transition.
    fn advance_order_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> impl Future<Output = Result<Order, RepositoryError>> + Send;
}

/// Catalog reads and management writes.
pub trait CatalogStore: Send + Sync {
    fn list_categories(&self)
    -> impl Future<Output = Result<Vec<Category>, RepositoryError>> + Send;

    fn create_category(
        &self,
        category: &NewCategory,
    ) -> impl Future<Output = Result<Category, RepositoryError>> + Send;

    fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> impl Future<Output = Result<Category, RepositoryError>> + Send;

    fn get_product(
        &self,
        id: ProductId,
    ) -> impl Future<Output = Result<Option<Product>, RepositoryError>> + Send;

    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, RepositoryError>> + Send;

    fn create_product(
        &self,
        product: &NewProduct,
    ) -> impl Future<Output = Result<Product, RepositoryError>> + Send;
}

/// Everything the storefront needs from storage.
pub trait Store: CartStore + OrderStore + StockLedger + CatalogStore + 'static {
    /// Check that storage is reachable.
    fn ping(&self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

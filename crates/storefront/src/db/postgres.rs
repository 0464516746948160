//! `PostgreSQL` implementation of the storage traits.

use sqlx::PgPool;

use shopline_core::cart::{Cart, CartLine, CartSnapshot};
use shopline_core::catalog::{Category, NewCategory, NewProduct, Product};
use shopline_core::checkout::OrderDraft;
use shopline_core::order::Order;
use shopline_core::{CartLineId, CategoryId, OrderId, OrderStatus, ProductId, Quantity, UserId};

use super::store::{
    CartStore, CatalogStore, LedgerError, OrderStore, PlaceOrderError, StockLedger, Store,
};
use super::{CartRepository, CatalogRepository, OrderRepository, RepositoryError, StockRepository};

/// Storage handle backed by a `PostgreSQL` pool.
///
/// Cheap to clone; every clone shares the pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool (for the session store and migrations).
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl CartStore for PgStore {
    async fn get_or_create_cart(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        CartRepository::new(&self.pool).get_or_create(user_id).await
    }

    async fn load_cart(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        CartRepository::new(&self.pool).load(user_id).await
    }

    async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        CartRepository::new(&self.pool)
            .add_line(user_id, product_id, quantity)
            .await
    }

    async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        CartRepository::new(&self.pool)
            .set_quantity(user_id, line_id, quantity)
            .await
    }

    async fn remove_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        CartRepository::new(&self.pool)
            .remove_line(user_id, line_id)
            .await
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        CartRepository::new(&self.pool).clear(user_id).await
    }
}

impl StockLedger for PgStore {
    async fn decrement(&self, product_id: ProductId, amount: Quantity) -> Result<i32, LedgerError> {
        StockRepository::new(&self.pool)
            .decrement(product_id, amount)
            .await
    }

    async fn restock(&self, product_id: ProductId, amount: Quantity) -> Result<i32, LedgerError> {
        StockRepository::new(&self.pool)
            .restock(product_id, amount)
            .await
    }

    async fn stock_level(&self, product_id: ProductId) -> Result<i32, LedgerError> {
        StockRepository::new(&self.pool)
            .stock_level(product_id)
            .await
    }
}

impl OrderStore for PgStore {
    async fn place_order(&self, draft: &OrderDraft) -> Result<OrderId, PlaceOrderError> {
        OrderRepository::new(&self.pool).place_order(draft).await
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).get(order_id).await
    }

    async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        OrderRepository::new(&self.pool).list_for_user(user_id).await
    }

    async fn advance_order_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        OrderRepository::new(&self.pool)
            .advance_status(order_id, next)
            .await
    }
}

impl CatalogStore for PgStore {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        CatalogRepository::new(&self.pool).list_categories().await
    }

    async fn create_category(&self, category: &NewCategory) -> Result<Category, RepositoryError> {
        CatalogRepository::new(&self.pool)
            .create_category(category)
            .await
    }

    async fn update_category(
        &self,
        id: CategoryId,
        category: &NewCategory,
    ) -> Result<Category, RepositoryError> {
        CatalogRepository::new(&self.pool)
            .update_category(id, category)
            .await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        CatalogRepository::new(&self.pool).get_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, RepositoryError> {
        CatalogRepository::new(&self.pool).list_products().await
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        CatalogRepository::new(&self.pool)
            .create_product(product)
            .await
    }
}

impl Store for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

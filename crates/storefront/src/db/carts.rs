//! Cart repository for database operations.
//!
//! Every mutation is one statement that checks ownership and writes in the
//! same step, so concurrent requests for the same cart never lose an update.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use shopline_core::cart::{Cart, CartLine, CartSnapshot, PricedCartLine};
use shopline_core::{CartId, CartLineId, Price, ProductId, Quantity, UserId};

use super::{RepositoryError, decode_as_corruption, map_fk_violation};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    id: CartLineId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: Quantity,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PricedLineRow {
    line_id: CartLineId,
    product_id: ProductId,
    product_name: String,
    quantity: Quantity,
    unit_price: Price,
    stock: i32,
}

impl From<PricedLineRow> for PricedCartLine {
    fn from(row: PricedLineRow) -> Self {
        Self {
            line_id: row.line_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            stock: row.stock,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the user's cart, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_or_create(&self, user_id: UserId) -> Result<Cart, RepositoryError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query_as::<_, CartRow>(
            r"
            INSERT INTO storefront.cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, created_at, updated_at
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Get the user's cart if it exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT id, user_id, created_at, updated_at
            FROM storefront.cart
            WHERE user_id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Cart::from))
    }

    /// Load the user's cart joined with current product prices and stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored price or quantity is invalid.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn load(&self, user_id: UserId) -> Result<Option<CartSnapshot>, RepositoryError> {
        let Some(cart) = self.get_by_user(user_id).await? else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, PricedLineRow>(
            r"
            SELECT cl.id AS line_id, cl.product_id, p.name AS product_name,
                   cl.quantity, p.price AS unit_price, p.stock
            FROM storefront.cart_line cl
            JOIN storefront.product p ON p.id = cl.product_id
            WHERE cl.cart_id = $1
            ORDER BY cl.id
            ",
        )
        .bind(cart.id)
        .fetch_all(self.pool)
        .await
        .map_err(decode_as_corruption)?;

        Ok(Some(CartSnapshot {
            cart,
            lines: lines.into_iter().map(PricedCartLine::from).collect(),
        }))
    }

    /// Insert a line or add to the existing line for the same product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the merged quantity would exceed the maximum.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let cart = self.get_or_create(user_id).await?;

        // No row comes back when the WHERE on the conflict branch rejects the merge.
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            INSERT INTO storefront.cart_line (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE
                SET quantity = storefront.cart_line.quantity + EXCLUDED.quantity
                WHERE storefront.cart_line.quantity + EXCLUDED.quantity <= $4
            RETURNING id, cart_id, product_id, quantity
            ",
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(quantity)
        .bind(Quantity::MAX)
        .fetch_optional(self.pool)
        .await
        .map_err(map_fk_violation)?;

        row.map(CartLine::from).ok_or_else(|| {
            RepositoryError::Conflict(format!("quantity would exceed {}", Quantity::MAX))
        })
    }

    /// Set a line's quantity if the line belongs to the user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    /// Returns `RepositoryError::Forbidden` if the line belongs to another user.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self), fields(user_id = %user_id, line_id = %line_id))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        line_id: CartLineId,
        quantity: Quantity,
    ) -> Result<CartLine, RepositoryError> {
        let row = sqlx::query_as::<_, CartLineRow>(
            r"
            UPDATE storefront.cart_line cl
            SET quantity = $3
            FROM storefront.cart c
            WHERE cl.id = $2 AND cl.cart_id = c.id AND c.user_id = $1
            RETURNING cl.id, cl.cart_id, cl.product_id, cl.quantity
            ",
        )
        .bind(user_id)
        .bind(line_id)
        .bind(quantity)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missing_line_error(line_id).await?),
        }
    }

    /// Delete a line if it belongs to the user. Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Forbidden` if the line belongs to another user.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self), fields(user_id = %user_id, line_id = %line_id))]
    pub async fn remove_line(
        &self,
        user_id: UserId,
        line_id: CartLineId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_line cl
            USING storefront.cart c
            WHERE cl.id = $2 AND cl.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .bind(line_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        match self.missing_line_error(line_id).await? {
            RepositoryError::NotFound => Ok(false),
            other => Err(other),
        }
    }

    /// Delete every line in the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_line cl
            USING storefront.cart c
            WHERE cl.cart_id = c.id AND c.user_id = $1
            ",
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Classify a line the caller could not touch: absent or someone else's.
    async fn missing_line_error(
        &self,
        line_id: CartLineId,
    ) -> Result<RepositoryError, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM storefront.cart_line WHERE id = $1)",
        )
        .bind(line_id)
        .fetch_one(self.pool)
        .await?;

        Ok(if exists {
            RepositoryError::Forbidden
        } else {
            RepositoryError::NotFound
        })
    }
}

//! Order repository for database operations.
//!
//! [`OrderRepository::place_order`] is the commit half of checkout. It runs in
//! one transaction: the order, its lines, every stock decrement and the cart
//! clear either all land or none do.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use shopline_core::checkout::{OrderDraft, StockShortage};
use shopline_core::order::{Order, OrderLine};
use shopline_core::{
    CartLineId, OrderId, OrderLineId, OrderStatus, Price, ProductId, Quantity, UserId,
};

use super::stock::{current_stock, decrement_stock};
use super::store::PlaceOrderError;
use super::{RepositoryError, decode_as_corruption};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total: Decimal,
    shipping_address: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: OrderLineId,
    order_id: OrderId,
    product_id: ProductId,
    quantity: Quantity,
    unit_price: Price,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            total: self.total,
            shipping_address: self.shipping_address,
            created_at: self.created_at,
            lines,
        }
    }
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, status::text AS status, total, shipping_address, created_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Commit a validated draft.
    ///
    /// # Errors
    ///
    /// Returns `PlaceOrderError::CartChanged` if a line was added, removed or
    /// re-quantified after the snapshot was read.
    /// Returns `PlaceOrderError::OutOfStock` listing every line whose
    /// conditional decrement failed; the transaction is rolled back.
    /// Returns `PlaceOrderError::Repository` for database errors; the
    /// transaction is rolled back when dropped.
    #[instrument(skip(self, draft), fields(user_id = %draft.user_id, cart_id = %draft.cart_id, lines = draft.lines.len()))]
    pub async fn place_order(&self, draft: &OrderDraft) -> Result<OrderId, PlaceOrderError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        // The cart must still be exactly the snapshot that was priced.
        let current = sqlx::query_as::<_, (CartLineId, Quantity)>(
            r"
            SELECT id, quantity
            FROM storefront.cart_line
            WHERE cart_id = $1
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(draft.cart_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(decode_as_corruption)?
        .into_iter()
        .collect::<HashMap<_, _>>();
        if current.len() != draft.lines.len()
            || draft
                .lines
                .iter()
                .any(|line| current.get(&line.cart_line_id) != Some(&line.quantity))
        {
            return Err(PlaceOrderError::CartChanged);
        }

        // Lock product rows in id order so concurrent checkouts cannot deadlock.
        let mut product_ids: Vec<i32> = draft
            .lines
            .iter()
            .map(|line| line.product_id.as_i32())
            .collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        sqlx::query(
            r"
            SELECT id
            FROM storefront.product
            WHERE id = ANY($1)
            ORDER BY id
            FOR NO KEY UPDATE
            ",
        )
        .bind(product_ids)
        .execute(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        let order_id: OrderId = sqlx::query_scalar(
            r#"
            INSERT INTO storefront."order" (user_id, status, total, shipping_address)
            VALUES ($1, $2::storefront.order_status, $3, $4)
            RETURNING id
            "#,
        )
        .bind(draft.user_id)
        .bind(draft.status)
        .bind(draft.total)
        .bind(draft.shipping_address.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(RepositoryError::from)?;

        for line in &draft.lines {
            sqlx::query(
                r"
                INSERT INTO storefront.order_line (order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        }

        // Keep going after a failed decrement so the caller sees every shortage.
        let mut shortages = Vec::new();
        for line in &draft.lines {
            let decremented = decrement_stock(&mut *tx, line.product_id, line.quantity)
                .await
                .map_err(RepositoryError::from)?;
            if decremented.is_none() {
                let available = current_stock(&mut *tx, line.product_id)
                    .await
                    .map_err(RepositoryError::from)?
                    .unwrap_or(0);
                shortages.push(StockShortage {
                    product_id: line.product_id,
                    product_name: line.product_name.clone(),
                    requested: line.quantity.get(),
                    available,
                });
            }
        }

        if !shortages.is_empty() {
            tx.rollback().await.map_err(RepositoryError::from)?;
            return Err(PlaceOrderError::OutOfStock(shortages));
        }

        let ordered_lines: Vec<i32> = draft
            .lines
            .iter()
            .map(|line| line.cart_line_id.as_i32())
            .collect();
        sqlx::query("DELETE FROM storefront.cart_line WHERE id = ANY($1)")
            .bind(ordered_lines)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(order_id)
    }

    /// Get an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored value is invalid.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get(&self, order_id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"SELECT {ORDER_COLUMNS} FROM storefront."order" WHERE id = $1"#
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await
        .map_err(decode_as_corruption)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut lines = self.lines_for(&[order_id]).await?;
        let lines = lines.remove(&order_id).unwrap_or_default();
        Ok(Some(row.into_order(lines)))
    }

    /// All of a user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored value is invalid.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM storefront."order"
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await
        .map_err(decode_as_corruption)?;

        let ids: Vec<OrderId> = rows.iter().map(|row| row.id).collect();
        let mut lines = self.lines_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_lines = lines.remove(&row.id).unwrap_or_default();
                row.into_order(order_lines)
            })
            .collect())
    }

    /// Move an order to `next` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    /// Returns `RepositoryError::Conflict` if the transition is not allowed.
    #[instrument(skip(self), fields(order_id = %order_id, next = %next))]
    pub async fn advance_status(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> = sqlx::query_scalar(
            r#"SELECT status::text FROM storefront."order" WHERE id = $1 FOR UPDATE"#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(decode_as_corruption)?;

        let current = current.ok_or(RepositoryError::NotFound)?;
        if !current.can_transition_to(next) {
            return Err(RepositoryError::Conflict(format!(
                "order cannot move from {current} to {next}"
            )));
        }

        sqlx::query(
            r#"
            UPDATE storefront."order"
            SET status = $2::storefront.order_status, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(next)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(order_id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Lines for a set of orders, grouped by order.
    async fn lines_for(
        &self,
        order_ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderLine>>, RepositoryError> {
        if order_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let raw_ids: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT id, order_id, product_id, quantity, unit_price
            FROM storefront.order_line
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(raw_ids)
        .fetch_all(self.pool)
        .await
        .map_err(decode_as_corruption)?;

        let mut grouped: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row.into());
        }
        Ok(grouped)
    }
}

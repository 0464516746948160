//! Cart model and the priced cart view.
//!
//! A cart line stores only `(product, quantity)`. Prices are never stored on
//! the cart: every read joins the *current* product price and stock, so cart
//! pricing is always live. Quantities above current stock are allowed to sit
//! in the cart; the view flags them so the UI can warn before checkout.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{CartId, CartLineId, Price, ProductId, Quantity, UserId};

/// A user's cart. Exactly one per user, created lazily.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: Quantity,
}

/// A cart line joined with the current product snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCartLine {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Price,
    pub stock: i32,
}

impl PricedCartLine {
    /// Whether the requested quantity is above the product's current stock.
    #[must_use]
    pub fn exceeds_stock(&self) -> bool {
        self.quantity.get() > self.stock
    }
}

/// Cart snapshot loaded for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub cart: Cart,
    pub lines: Vec<PricedCartLine>,
}

/// One line of the cart as presented to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineView {
    pub line_id: CartLineId,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Current stock for the product.
    pub available: i32,
    /// Checkout will reject this line unless stock is replenished.
    pub exceeds_stock: bool,
}

impl From<&PricedCartLine> for CartLineView {
    fn from(line: &PricedCartLine) -> Self {
        Self {
            line_id: line.line_id,
            product_id: line.product_id,
            name: line.product_name.clone(),
            quantity: line.quantity.get(),
            unit_price: line.unit_price.amount(),
            line_total: line
                .unit_price
                .amount()
                .saturating_mul(Decimal::from(line.quantity.get())),
            available: line.stock,
            exceeds_stock: line.exceeds_stock(),
        }
    }
}

/// Cart contents with a live subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: Decimal,
    pub item_count: i64,
    pub has_stock_warnings: bool,
}

impl CartView {
    /// An empty cart.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            lines: Vec::new(),
            subtotal: Decimal::ZERO,
            item_count: 0,
            has_stock_warnings: false,
        }
    }

    /// Build a view from priced lines, using current prices.
    #[must_use]
    pub fn from_lines(lines: &[PricedCartLine]) -> Self {
        Self::from_views(lines.iter().map(CartLineView::from).collect())
    }

    /// Build a view from line views, recomputing the derived totals.
    #[must_use]
    pub fn from_views(lines: Vec<CartLineView>) -> Self {
        let subtotal = lines
            .iter()
            .fold(Decimal::ZERO, |acc, line| acc.saturating_add(line.line_total));
        let item_count = lines.iter().map(|line| i64::from(line.quantity)).sum();
        let has_stock_warnings = lines.iter().any(|line| line.exceeds_stock);

        Self {
            lines,
            subtotal,
            item_count,
            has_stock_warnings,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Find the line for a product, if present.
    #[must_use]
    pub fn line_for_product(&self, product_id: ProductId) -> Option<&CartLineView> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }
}

impl Default for CartView {
    fn default() -> Self {
        Self::empty()
    }
}

//! Local mirror of the server cart.
//!
//! Every mutation is applied in two phases. [`CartMirror::apply`] changes the
//! mirror immediately and returns the [`Compensation`] that undoes it. When the
//! server answers, either [`CartMirror::confirm`] replaces the mirror with the
//! server's cart, or [`CartMirror::compensate`] runs the inverse.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopline_core::cart::{CartLineView, CartView};
use shopline_core::{CartLineId, ProductId, Quantity};

/// Product details needed to show an optimistic line before the server has
/// priced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRef {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
}

/// One cart line as the client shows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLine {
    /// `None` until the server has created the line.
    pub line_id: Option<CartLineId>,
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Stock at the last server read; `None` for optimistic lines.
    pub available: Option<i32>,
}

impl LocalLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price
            .saturating_mul(Decimal::from(self.quantity))
    }

    /// Whether checkout would reject this line at the last known stock.
    #[must_use]
    pub fn exceeds_stock(&self) -> bool {
        self.available
            .is_some_and(|available| self.quantity > available)
    }
}

impl From<&CartLineView> for LocalLine {
    fn from(line: &CartLineView) -> Self {
        Self {
            line_id: Some(line.line_id),
            product_id: line.product_id,
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            available: Some(line.available),
        }
    }
}

/// A cart mutation, as sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Add { product: ProductRef, quantity: Quantity },
    /// Quantities below 1 remove the line.
    SetQuantity { line_id: CartLineId, quantity: i32 },
    Remove { line_id: CartLineId },
    Clear,
}

/// The inverse of an applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Compensation {
    /// The mutation did not change the mirror.
    Nothing,
    /// Drop a line the mutation created.
    RemoveProduct(ProductId),
    /// Put a line's quantity back.
    SetProductQuantity { product_id: ProductId, quantity: i32 },
    /// Put a removed line back at its position.
    Insert { index: usize, line: LocalLine },
    /// Put every line back.
    Restore(Vec<LocalLine>),
}

/// The client's copy of the cart lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartMirror {
    lines: Vec<LocalLine>,
}

impl CartMirror {
    /// A mirror holding `lines`.
    #[must_use]
    pub const fn from_lines(lines: Vec<LocalLine>) -> Self {
        Self { lines }
    }

    #[must_use]
    pub fn lines(&self) -> &[LocalLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of line totals at the prices last seen.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines
            .iter()
            .fold(Decimal::ZERO, |acc, line| acc.saturating_add(line.line_total()))
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }

    /// Apply `mutation` locally and return its inverse.
    pub fn apply(&mut self, mutation: &Mutation) -> Compensation {
        match mutation {
            Mutation::Add { product, quantity } => self.apply_add(product, *quantity),
            Mutation::SetQuantity { line_id, quantity } if *quantity < 1 => {
                self.apply_remove(*line_id)
            }
            Mutation::SetQuantity { line_id, quantity } => {
                let Some(line) = self.line_mut(*line_id) else {
                    return Compensation::Nothing;
                };
                let previous = line.quantity;
                line.quantity = *quantity;
                Compensation::SetProductQuantity {
                    product_id: line.product_id,
                    quantity: previous,
                }
            }
            Mutation::Remove { line_id } => self.apply_remove(*line_id),
            Mutation::Clear => Compensation::Restore(std::mem::take(&mut self.lines)),
        }
    }

    /// Undo a mutation whose server call failed.
    pub fn compensate(&mut self, compensation: Compensation) {
        match compensation {
            Compensation::Nothing => {}
            Compensation::RemoveProduct(product_id) => {
                self.lines.retain(|line| line.product_id != product_id);
            }
            Compensation::SetProductQuantity {
                product_id,
                quantity,
            } => {
                if let Some(line) = self
                    .lines
                    .iter_mut()
                    .find(|line| line.product_id == product_id)
                {
                    line.quantity = quantity;
                }
            }
            Compensation::Insert { index, line } => {
                let index = index.min(self.lines.len());
                self.lines.insert(index, line);
            }
            Compensation::Restore(lines) => self.lines = lines,
        }
    }

    /// Replace the mirror with the server's cart.
    pub fn confirm(&mut self, server: &CartView) {
        self.lines = server.lines.iter().map(LocalLine::from).collect();
    }

    fn apply_add(&mut self, product: &ProductRef, quantity: Quantity) -> Compensation {
        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| line.product_id == product.id)
        {
            let previous = line.quantity;
            line.quantity = previous.saturating_add(quantity.get());
            return Compensation::SetProductQuantity {
                product_id: product.id,
                quantity: previous,
            };
        }

        self.lines.push(LocalLine {
            line_id: None,
            product_id: product.id,
            name: product.name.clone(),
            quantity: quantity.get(),
            unit_price: product.unit_price,
            available: None,
        });
        Compensation::RemoveProduct(product.id)
    }

    fn apply_remove(&mut self, line_id: CartLineId) -> Compensation {
        match self
            .lines
            .iter()
            .position(|line| line.line_id == Some(line_id))
        {
            Some(index) => Compensation::Insert {
                index,
                line: self.lines.remove(index),
            },
            None => Compensation::Nothing,
        }
    }

    fn line_mut(&mut self, line_id: CartLineId) -> Option<&mut LocalLine> {
        self.lines
            .iter_mut()
            .find(|line| line.line_id == Some(line_id))
    }
}

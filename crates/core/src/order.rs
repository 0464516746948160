//! Orders and order lines.
//!
//! Order lines capture the unit price at purchase time. The order total is
//! computed once, when the order is created, and never recomputed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{OrderId, OrderLineId, OrderStatus, Price, ProductId, Quantity, UserId};

/// A committed order with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

/// One purchased product within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    /// Snapshot price; unaffected by later catalog price changes.
    pub unit_price: Price,
}

impl OrderLine {
    /// `quantity * unit_price`, or `None` on overflow.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.line_total(self.quantity)
    }
}

impl Order {
    /// Sum of all line totals, or `None` on overflow.
    #[must_use]
    pub fn lines_total(&self) -> Option<Decimal> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    }

    /// Whether the stored total equals the sum of its lines exactly.
    #[must_use]
    pub fn total_matches_lines(&self) -> bool {
        self.lines_total() == Some(self.total)
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.lines
            .iter()
            .map(|line| i64::from(line.quantity.get()))
            .sum()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, cents: i64, qty: i32) -> OrderLine {
        OrderLine {
            id: OrderLineId::new(id),
            product_id: ProductId::new(id),
            quantity: Quantity::new(qty).unwrap(),
            unit_price: Price::new(Decimal::new(cents, 2)).unwrap(),
        }
    }

    fn order(total: Decimal, lines: Vec<OrderLine>) -> Order {
        Order {
            id: OrderId::new(1),
            user_id: UserId::new(1),
            status: OrderStatus::Pending,
            total,
            shipping_address: "123 Main St".to_string(),
            created_at: Utc::now(),
            lines,
        }
    }

    #[test]
    fn test_total_matches_lines() {
        let order = order(
            Decimal::new(2500, 2),
            vec![line(1, 1000, 2), line(2, 500, 1)],
        );
        assert!(order.total_matches_lines());
        assert_eq!(order.item_count(), 3);
    }

    #[test]
    fn test_total_mismatch_detected() {
        let order = order(Decimal::new(2400, 2), vec![line(1, 1000, 2), line(2, 500, 1)]);
        assert!(!order.total_matches_lines());
    }

    #[test]
    fn test_scale_does_not_matter_for_equality() {
        // 25 == 25.00 for Decimal
        let order = order(Decimal::new(25, 0), vec![line(1, 1000, 2), line(2, 500, 1)]);
        assert!(order.total_matches_lines());
    }
}

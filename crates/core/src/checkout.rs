//! Checkout validation rules.
//!
//! These are the pure steps of a checkout attempt: totalling the cart
//! snapshot, comparing every line against current stock, and freezing the
//! result into an [`OrderDraft`]. The storage layer then commits the draft
//! atomically, where the conditional stock decrement is the final gate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::{CartSnapshot, PricedCartLine};
use crate::{CartId, CartLineId, OrderStatus, PaymentState, Price, ProductId, Quantity, ShippingAddress, UserId};

/// Default ceiling for a single order total (one million).
pub const DEFAULT_MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 2);

/// A cart line that cannot be fulfilled from current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortage {
    pub product_id: ProductId,
    pub product_name: String,
    pub requested: i32,
    pub available: i32,
}

/// Reasons an order total is rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidTotal {
    #[error("order total overflowed")]
    Overflow,
    #[error("order total must be positive, got {0}")]
    NotPositive(Decimal),
    #[error("order total {total} exceeds the maximum of {ceiling}")]
    ExceedsCeiling { total: Decimal, ceiling: Decimal },
}

/// Reasons a cart snapshot cannot become an order.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotRejection {
    #[error("cart is empty")]
    EmptyCart,
    #[error(transparent)]
    InvalidTotal(#[from] InvalidTotal),
    #[error("{} line(s) exceed available stock", .0.len())]
    OutOfStock(Vec<StockShortage>),
}

/// Sum `quantity * unit_price` over the lines, rejecting totals that are not
/// strictly positive or not below `ceiling`.
///
/// # Errors
///
/// Returns [`InvalidTotal`] on overflow, a zero total, or a total at or above
/// the ceiling.
pub fn order_total(lines: &[PricedCartLine], ceiling: Decimal) -> Result<Decimal, InvalidTotal> {
    let total = lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        line.unit_price
            .line_total(line.quantity)
            .and_then(|line_total| acc.checked_add(line_total))
            .ok_or(InvalidTotal::Overflow)
    })?;

    if total <= Decimal::ZERO {
        return Err(InvalidTotal::NotPositive(total));
    }
    if total >= ceiling {
        return Err(InvalidTotal::ExceedsCeiling { total, ceiling });
    }

    Ok(total)
}

/// Every line whose quantity exceeds current stock, in cart order.
#[must_use]
pub fn stock_shortages(lines: &[PricedCartLine]) -> Vec<StockShortage> {
    lines
        .iter()
        .filter(|line| line.exceeds_stock())
        .map(|line| StockShortage {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            requested: line.quantity.get(),
            available: line.stock.max(0),
        })
        .collect()
}

/// One order line to be written, priced from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineDraft {
    pub cart_line_id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    pub unit_price: Price,
}

/// A validated order, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub cart_id: CartId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub shipping_address: ShippingAddress,
    pub lines: Vec<OrderLineDraft>,
}

impl OrderDraft {
    /// Validate a cart snapshot and freeze it into a draft.
    ///
    /// Checks run in order: non-empty cart, total, then stock. Stock is
    /// checked against every line so the rejection lists all shortages.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotRejection`] if the cart is empty, the total is
    /// invalid, or any line exceeds current stock.
    pub fn from_snapshot(
        snapshot: &CartSnapshot,
        shipping_address: ShippingAddress,
        payment: PaymentState,
        max_total: Decimal,
    ) -> Result<Self, SnapshotRejection> {
        if snapshot.lines.is_empty() {
            return Err(SnapshotRejection::EmptyCart);
        }

        let total = order_total(&snapshot.lines, max_total)?;

        let shortages = stock_shortages(&snapshot.lines);
        if !shortages.is_empty() {
            return Err(SnapshotRejection::OutOfStock(shortages));
        }

        let lines = snapshot
            .lines
            .iter()
            .map(|line| OrderLineDraft {
                cart_line_id: line.line_id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        Ok(Self {
            user_id: snapshot.cart.user_id,
            cart_id: snapshot.cart.id,
            status: payment.initial_order_status(),
            total,
            shipping_address,
            lines,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::cart::Cart;

    fn line(product: i32, cents: i64, qty: i32, stock: i32) -> PricedCartLine {
        PricedCartLine {
            line_id: CartLineId::new(product),
            product_id: ProductId::new(product),
            product_name: format!("Product {product}"),
            quantity: Quantity::new(qty).unwrap(),
            unit_price: Price::new(Decimal::new(cents, 2)).unwrap(),
            stock,
        }
    }

    fn snapshot(lines: Vec<PricedCartLine>) -> CartSnapshot {
        CartSnapshot {
            cart: Cart {
                id: CartId::new(7),
                user_id: UserId::new(3),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            lines,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress::parse("123 Main St").unwrap()
    }

    #[test]
    fn test_default_ceiling_is_one_million() {
        assert_eq!(DEFAULT_MAX_ORDER_TOTAL, Decimal::new(1_000_000, 0));
    }

    #[test]
    fn test_order_total_sums_snapshot_prices() {
        let lines = [line(1, 1000, 2, 5), line(2, 500, 1, 5)];
        assert_eq!(
            order_total(&lines, DEFAULT_MAX_ORDER_TOTAL).unwrap(),
            Decimal::new(2500, 2)
        );
    }

    #[test]
    fn test_order_total_rejects_zero() {
        let lines = [line(1, 0, 2, 5)];
        assert_eq!(
            order_total(&lines, DEFAULT_MAX_ORDER_TOTAL),
            Err(InvalidTotal::NotPositive(Decimal::ZERO))
        );
    }

    #[test]
    fn test_order_total_rejects_ceiling() {
        let lines = [line(1, 1000, 2, 5)];
        assert!(matches!(
            order_total(&lines, Decimal::new(20, 0)),
            Err(InvalidTotal::ExceedsCeiling { .. })
        ));
        assert!(order_total(&lines, Decimal::new(2001, 2)).is_ok());
    }

    #[test]
    fn test_order_total_rejects_overflow() {
        let huge = PricedCartLine {
            unit_price: Price::new(Decimal::MAX).unwrap(),
            ..line(1, 0, 9_999, 10_000)
        };
        assert_eq!(
            order_total(&[huge], DEFAULT_MAX_ORDER_TOTAL),
            Err(InvalidTotal::Overflow)
        );
    }

    #[test]
    fn test_stock_shortages_reports_every_line() {
        let lines = [line(1, 1000, 3, 2), line(2, 500, 1, 5), line(3, 100, 4, 0)];
        let shortages = stock_shortages(&lines);

        assert_eq!(shortages.len(), 2);
        assert_eq!(shortages[0].product_id, ProductId::new(1));
        assert_eq!(shortages[0].requested, 3);
        assert_eq!(shortages[0].available, 2);
        assert_eq!(shortages[1].product_id, ProductId::new(3));
        assert_eq!(shortages[1].available, 0);
    }

    #[test]
    fn test_from_snapshot_builds_draft() {
        let draft = OrderDraft::from_snapshot(
            &snapshot(vec![line(1, 1000, 2, 5), line(2, 500, 1, 5)]),
            address(),
            PaymentState::Unpaid,
            DEFAULT_MAX_ORDER_TOTAL,
        )
        .unwrap();

        assert_eq!(draft.total, Decimal::new(2500, 2));
        assert_eq!(draft.status, OrderStatus::Pending);
        assert_eq!(draft.user_id, UserId::new(3));
        assert_eq!(draft.cart_id, CartId::new(7));
        assert_eq!(draft.lines.len(), 2);
        assert_eq!(draft.lines[0].unit_price.amount(), Decimal::new(1000, 2));
    }

    #[test]
    fn test_from_snapshot_authorized_payment_starts_processing() {
        let draft = OrderDraft::from_snapshot(
            &snapshot(vec![line(1, 1000, 1, 5)]),
            address(),
            PaymentState::Authorized,
            DEFAULT_MAX_ORDER_TOTAL,
        )
        .unwrap();
        assert_eq!(draft.status, OrderStatus::Processing);
    }

    #[test]
    fn test_from_snapshot_out_of_stock() {
        let result = OrderDraft::from_snapshot(
            &snapshot(vec![line(1, 1000, 3, 2)]),
            address(),
            PaymentState::Unpaid,
            DEFAULT_MAX_ORDER_TOTAL,
        );

        let Err(SnapshotRejection::OutOfStock(shortages)) = result else {
            panic!("expected out of stock, got {result:?}");
        };
        assert_eq!(
            shortages,
            vec![StockShortage {
                product_id: ProductId::new(1),
                product_name: "Product 1".to_string(),
                requested: 3,
                available: 2,
            }]
        );
    }

    #[test]
    fn test_from_snapshot_empty_cart() {
        assert_eq!(
            OrderDraft::from_snapshot(
                &snapshot(vec![]),
                address(),
                PaymentState::Unpaid,
                DEFAULT_MAX_ORDER_TOTAL,
            ),
            Err(SnapshotRejection::EmptyCart)
        );
    }

    #[test]
    fn test_total_checked_before_stock() {
        let result = OrderDraft::from_snapshot(
            &snapshot(vec![line(1, 0, 3, 2)]),
            address(),
            PaymentState::Unpaid,
            DEFAULT_MAX_ORDER_TOTAL,
        );
        assert!(matches!(result, Err(SnapshotRejection::InvalidTotal(_))));
    }
}

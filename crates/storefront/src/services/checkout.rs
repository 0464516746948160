//! Checkout transaction.
//!
//! A checkout attempt reads a snapshot of the cart, validates it, and then
//! commits the order through [`OrderStore::place_order`]. The commit re-checks
//! stock with a conditional decrement per line, so a competing checkout that
//! drained stock after validation still rolls this attempt back cleanly.

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use shopline_core::checkout::{InvalidTotal, OrderDraft, SnapshotRejection, StockShortage};
use shopline_core::{
    AddressError, CheckoutPhase, OrderId, PaymentState, ShippingAddress, UserId,
};

use crate::db::{CartStore, OrderStore, PlaceOrderError, RepositoryError};

/// Checkout input from the caller.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    #[serde(default)]
    pub payment: PaymentState,
}

/// Errors from a checkout attempt. Nothing is persisted for any of them.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("invalid shipping address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid order total: {0}")]
    InvalidTotal(#[from] InvalidTotal),

    /// One entry per line that cannot be fulfilled.
    #[error("{} line(s) exceed available stock", .0.len())]
    OutOfStock(Vec<StockShortage>),

    /// The cart was edited after it was read; retrying sees the new cart.
    #[error("cart changed during checkout, please retry")]
    CartChanged,

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<SnapshotRejection> for CheckoutError {
    fn from(rejection: SnapshotRejection) -> Self {
        match rejection {
            SnapshotRejection::EmptyCart => Self::EmptyCart,
            SnapshotRejection::InvalidTotal(total) => Self::InvalidTotal(total),
            SnapshotRejection::OutOfStock(shortages) => Self::OutOfStock(shortages),
        }
    }
}

impl From<PlaceOrderError> for CheckoutError {
    fn from(e: PlaceOrderError) -> Self {
        match e {
            PlaceOrderError::OutOfStock(shortages) => Self::OutOfStock(shortages),
            PlaceOrderError::CartChanged => Self::CartChanged,
            PlaceOrderError::Repository(e) => Self::Repository(e),
        }
    }
}

/// Phase tracker for one attempt. Transitions are logged as the `phase` field.
struct Attempt {
    phase: CheckoutPhase,
}

impl Attempt {
    fn start() -> Self {
        info!(phase = %CheckoutPhase::Validating, "Checkout started");
        Self {
            phase: CheckoutPhase::Validating,
        }
    }

    /// Move to `next`. Illegal transitions are refused and logged.
    fn advance(&mut self, next: CheckoutPhase) {
        if !self.phase.can_transition_to(next) {
            warn!(from = %self.phase, to = %next, "Refused checkout phase transition");
            return;
        }
        self.phase = next;
        info!(phase = %next, "Checkout phase");
    }

    fn fail(&mut self, error: CheckoutError) -> CheckoutError {
        let next = if self.phase == CheckoutPhase::Committing {
            CheckoutPhase::RolledBack
        } else {
            CheckoutPhase::Rejected
        };
        self.advance(next);
        error
    }
}

/// Turn the user's cart into an order, all or nothing.
///
/// On success the order, its lines, the stock decrements and the cart clear
/// are all persisted. On any error none of them are.
///
/// # Errors
///
/// Returns `CheckoutError::InvalidAddress` if the address fails validation.
/// Returns `CheckoutError::EmptyCart` if the cart is missing or has no lines.
/// Returns `CheckoutError::InvalidTotal` if the total is not positive or not
/// below `max_total`.
/// Returns `CheckoutError::OutOfStock` listing every short line, whether the
/// shortage was seen during validation or at commit.
/// Returns `CheckoutError::CartChanged` if the cart was edited between the
/// snapshot and the commit.
/// Returns `CheckoutError::Repository` if storage fails; the commit is rolled
/// back.
#[instrument(skip(store, request), fields(user_id = %user_id))]
pub async fn checkout<S>(
    store: &S,
    user_id: UserId,
    request: CheckoutRequest,
    max_total: Decimal,
) -> Result<OrderId, CheckoutError>
where
    S: CartStore + OrderStore,
{
    let mut attempt = Attempt::start();

    let shipping_address = match ShippingAddress::parse(&request.shipping_address) {
        Ok(address) => address,
        Err(e) => return Err(attempt.fail(e.into())),
    };

    let snapshot = match store.load_cart(user_id).await {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return Err(attempt.fail(CheckoutError::EmptyCart)),
        Err(e) => return Err(attempt.fail(e.into())),
    };

    let draft = match OrderDraft::from_snapshot(
        &snapshot,
        shipping_address,
        request.payment,
        max_total,
    ) {
        Ok(draft) => draft,
        Err(rejection) => return Err(attempt.fail(rejection.into())),
    };

    attempt.advance(CheckoutPhase::Committing);

    match store.place_order(&draft).await {
        Ok(order_id) => {
            attempt.advance(CheckoutPhase::Committed);
            info!(order_id = %order_id, total = %draft.total, "Order placed");
            Ok(order_id)
        }
        Err(e) => Err(attempt.fail(e.into())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shopline_core::checkout::DEFAULT_MAX_ORDER_TOTAL;
    use shopline_core::catalog::NewProduct;
    use shopline_core::{OrderStatus, Price, ProductId, Quantity};

    use super::*;
    use crate::db::{CatalogStore, CommitStage, MemoryStore, StockLedger};

    const ADDRESS: &str = "1 Harbour Street, Springfield";

    fn request() -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: ADDRESS.to_string(),
            payment: PaymentState::Unpaid,
        }
    }

    async fn product(store: &MemoryStore, name: &str, cents: i64, stock: i32) -> ProductId {
        store
            .create_product(&NewProduct {
                category_id: None,
                name: name.to_string(),
                price: Price::new(Decimal::new(cents, 2)).unwrap(),
                stock,
            })
            .await
            .unwrap()
            .id
    }

    async fn add(store: &MemoryStore, user: UserId, product_id: ProductId, quantity: i32) {
        store
            .add_line(user, product_id, Quantity::new(quantity).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_checkout_places_order_and_clears_cart() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let p = product(&store, "Lamp", 1000, 5).await;
        add(&store, user, p, 2).await;

        let order_id = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
            .await
            .unwrap();

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.total, Decimal::new(2000, 2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.total_matches_lines());
        assert_eq!(store.stock_level(p).await.unwrap(), 3);
        assert!(store.load_cart(user).await.unwrap().unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_authorized_payment_starts_processing() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let p = product(&store, "Lamp", 1000, 5).await;
        add(&store, user, p, 1).await;

        let order_id = checkout(
            &store,
            user,
            CheckoutRequest {
                shipping_address: ADDRESS.to_string(),
                payment: PaymentState::Authorized,
            },
            DEFAULT_MAX_ORDER_TOTAL,
        )
        .await
        .unwrap();

        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_checkout_reports_every_short_line() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let a = product(&store, "A", 1000, 1).await;
        let b = product(&store, "B", 1000, 10).await;
        let c = product(&store, "C", 1000, 0).await;
        add(&store, user, a, 2).await;
        add(&store, user, b, 1).await;
        add(&store, user, c, 1).await;

        let err = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
            .await
            .unwrap_err();

        let CheckoutError::OutOfStock(shortages) = err else {
            panic!("expected OutOfStock, got {err:?}");
        };
        let ids: Vec<ProductId> = shortages.iter().map(|s| s.product_id).collect();
        assert_eq!(ids, vec![a, c]);
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_level(b).await.unwrap(), 10);
        assert_eq!(store.load_cart(user).await.unwrap().unwrap().lines.len(), 3);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let store = MemoryStore::new();
        let user = UserId::new(1);

        assert!(matches!(
            checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL).await,
            Err(CheckoutError::EmptyCart)
        ));

        store.get_or_create_cart(user).await.unwrap();
        assert!(matches!(
            checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL).await,
            Err(CheckoutError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_checkout_total_at_ceiling_is_rejected() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let p = product(&store, "Lamp", 5000, 10).await;
        add(&store, user, p, 2).await;

        let err = checkout(&store, user, request(), Decimal::new(100, 0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::InvalidTotal(InvalidTotal::ExceedsCeiling { .. })
        ));
        assert_eq!(store.stock_level(p).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_checkout_zero_total_is_rejected() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let p = product(&store, "Sample", 0, 10).await;
        add(&store, user, p, 1).await;

        assert!(matches!(
            checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL).await,
            Err(CheckoutError::InvalidTotal(InvalidTotal::NotPositive(_)))
        ));
    }

    #[tokio::test]
    async fn test_checkout_short_address_is_rejected() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let p = product(&store, "Lamp", 1000, 10).await;
        add(&store, user, p, 1).await;

        let short = CheckoutRequest {
            shipping_address: "Nowhere".to_string(),
            payment: PaymentState::Unpaid,
        };
        assert!(matches!(
            checkout(&store, user, short, DEFAULT_MAX_ORDER_TOTAL).await,
            Err(CheckoutError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_checkout_commit_fault_rolls_back() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let a = product(&store, "A", 1000, 5).await;
        let b = product(&store, "B", 1000, 5).await;
        add(&store, user, a, 1).await;
        add(&store, user, b, 1).await;

        store.fail_next_commit_at(CommitStage::DecrementStock);
        assert!(matches!(
            checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL).await,
            Err(CheckoutError::Repository(_))
        ));

        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_level(a).await.unwrap(), 5);
        assert_eq!(store.stock_level(b).await.unwrap(), 5);
        assert_eq!(store.load_cart(user).await.unwrap().unwrap().lines.len(), 2);
    }

    async fn draft_for(store: &MemoryStore, user: UserId) -> OrderDraft {
        let snapshot = store.load_cart(user).await.unwrap().unwrap();
        OrderDraft::from_snapshot(
            &snapshot,
            ShippingAddress::parse(ADDRESS).unwrap(),
            PaymentState::Unpaid,
            DEFAULT_MAX_ORDER_TOTAL,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_line_added_after_snapshot_is_a_conflict() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let a = product(&store, "A", 1000, 5).await;
        let b = product(&store, "B", 500, 5).await;
        add(&store, user, a, 1).await;
        let draft = draft_for(&store, user).await;

        // Another tab adds a line between the read and the commit.
        add(&store, user, b, 2).await;
        let err = store.place_order(&draft).await.unwrap_err();

        assert!(matches!(err, PlaceOrderError::CartChanged));
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_level(a).await.unwrap(), 5);
        assert_eq!(store.load_cart(user).await.unwrap().unwrap().lines.len(), 2);

        // Retrying orders both lines and leaves the cart empty.
        let order_id = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
            .await
            .unwrap();
        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.total, Decimal::new(2000, 2));
        assert_eq!(store.stock_level(b).await.unwrap(), 3);
        assert!(store.load_cart(user).await.unwrap().unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_requantified_line_after_snapshot_is_a_conflict() {
        let store = MemoryStore::new();
        let user = UserId::new(1);
        let a = product(&store, "A", 1000, 5).await;
        add(&store, user, a, 1).await;
        let draft = draft_for(&store, user).await;
        let line_id = draft.lines[0].cart_line_id;

        store
            .set_quantity(user, line_id, Quantity::new(3).unwrap())
            .await
            .unwrap();
        let err = store.place_order(&draft).await.unwrap_err();

        assert!(matches!(err, PlaceOrderError::CartChanged));
        assert!(matches!(CheckoutError::from(err), CheckoutError::CartChanged));
        assert_eq!(store.order_count(), 0);
        assert_eq!(store.stock_level(a).await.unwrap(), 5);
        let cart = store.load_cart(user).await.unwrap().unwrap();
        assert_eq!(cart.lines[0].quantity.get(), 3);

        // A fresh attempt sees the new quantity.
        let order_id = checkout(&store, user, request(), DEFAULT_MAX_ORDER_TOTAL)
            .await
            .unwrap();
        let order = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.lines[0].quantity.get(), 3);
    }

    #[test]
    fn test_attempt_rejection_before_commit() {
        let mut attempt = Attempt::start();
        let err = attempt.fail(CheckoutError::EmptyCart);
        assert!(matches!(err, CheckoutError::EmptyCart));
        assert_eq!(attempt.phase, CheckoutPhase::Rejected);
    }

    #[test]
    fn test_attempt_refuses_illegal_transition() {
        let mut attempt = Attempt::start();
        attempt.advance(CheckoutPhase::Committing);
        attempt.advance(CheckoutPhase::Committed);

        attempt.advance(CheckoutPhase::Validating);
        let _ = attempt.fail(CheckoutError::EmptyCart);

        assert_eq!(attempt.phase, CheckoutPhase::Committed);
    }

    #[test]
    fn test_checkout_request_defaults_to_unpaid() {
        let request: CheckoutRequest =
            serde_json::from_str(r#"{"shipping_address":"1 Harbour Street"}"#).unwrap();
        assert_eq!(request.payment, PaymentState::Unpaid);
    }
}

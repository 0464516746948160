//! Order history for the signed-in user.

use thiserror::Error;
use tracing::instrument;

use shopline_core::order::Order;
use shopline_core::{OrderId, UserId};

use crate::db::{OrderStore, RepositoryError};

#[derive(Debug, Error)]
pub enum OrderAccessError {
    #[error("order not found")]
    NotFound,

    /// The order exists but belongs to another user.
    #[error("order belongs to another user")]
    Forbidden,

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Fetch one of the user's orders.
///
/// # Errors
///
/// Returns `OrderAccessError::NotFound` if the order does not exist.
/// Returns `OrderAccessError::Forbidden` if it belongs to someone else.
#[instrument(skip(store), fields(user_id = %user_id, order_id = %order_id))]
pub async fn get_order<S: OrderStore>(
    store: &S,
    user_id: UserId,
    order_id: OrderId,
) -> Result<Order, OrderAccessError> {
    let order = store
        .get_order(order_id)
        .await?
        .ok_or(OrderAccessError::NotFound)?;

    if order.user_id != user_id {
        return Err(OrderAccessError::Forbidden);
    }
    Ok(order)
}

/// The user's orders, newest first.
///
/// # Errors
///
/// Returns `OrderAccessError::Repository` if storage fails.
pub async fn list_orders<S: OrderStore>(
    store: &S,
    user_id: UserId,
) -> Result<Vec<Order>, OrderAccessError> {
    Ok(store.list_orders(user_id).await?)
}

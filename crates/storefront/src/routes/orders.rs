//! Order history route handlers.

use axum::{Json, extract::State};

use shopline_core::OrderId;
use shopline_core::order::Order;

use super::extract::ApiPath;
use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::services::orders;
use crate::state::AppState;

/// `GET /api/orders`
pub async fn index<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(orders::list_orders(state.store(), user.id).await?))
}

/// `GET /api/orders/{order_id}`
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    ApiPath(order_id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(
        orders::get_order(state.store(), user.id, order_id).await?,
    ))
}

//! Checkout route handler.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use shopline_core::OrderId;

use super::extract::ApiJson;
use crate::db::Store;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::services::checkout::{CheckoutRequest, checkout};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
}

/// `POST /api/checkout`
///
/// Responds `201 Created` with the new order ID. Rejections list every
/// out-of-stock line in the error body.
pub async fn create<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>)> {
    add_breadcrumb("checkout", "Checkout submitted", &[]);

    let order_id = checkout(
        state.store(),
        user.id,
        request,
        state.config().max_order_total,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse { order_id })))
}

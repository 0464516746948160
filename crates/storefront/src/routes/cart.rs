//! Cart route handlers.
//!
//! Every mutation answers with the full priced cart so clients can replace
//! their local copy with the server's view.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use shopline_core::cart::CartView;
use shopline_core::{CartLineId, ProductId};

use super::extract::{ApiJson, ApiPath};
use crate::db::Store;
use crate::error::Result;
use crate::middleware::{OptionalUser, RequireUser};
use crate::services::cart::CartService;
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: i64,
}

/// `GET /api/cart`
pub async fn show<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store()).read_cart(user.id).await?;
    Ok(Json(view))
}

/// `GET /api/cart/count`. Anonymous callers get zero.
pub async fn count<S: Store>(
    State(state): State<AppState<S>>,
    OptionalUser(user): OptionalUser,
) -> Result<Json<CartCount>> {
    let count = match user {
        Some(user) => CartService::new(state.store()).item_count(user.id).await?,
        None => 0,
    };
    Ok(Json(CartCount { count }))
}

/// `POST /api/cart/lines`
pub async fn add_line<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    ApiJson(request): ApiJson<AddLineRequest>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store())
        .add_line(user.id, request.product_id, request.quantity)
        .await?;
    Ok(Json(view))
}

/// `PATCH /api/cart/lines/{line_id}`. A quantity below 1 removes the line.
pub async fn set_quantity<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    ApiPath(line_id): ApiPath<CartLineId>,
    ApiJson(request): ApiJson<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store())
        .set_quantity(user.id, line_id, request.quantity)
        .await?;
    Ok(Json(view))
}

/// `DELETE /api/cart/lines/{line_id}`. Idempotent.
pub async fn remove_line<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
    ApiPath(line_id): ApiPath<CartLineId>,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store())
        .remove_line(user.id, line_id)
        .await?;
    Ok(Json(view))
}

/// `DELETE /api/cart`
pub async fn clear<S: Store>(
    State(state): State<AppState<S>>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    let view = CartService::new(state.store()).clear(user.id).await?;
    Ok(Json(view))
}

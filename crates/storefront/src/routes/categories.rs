//! Category listing.

use axum::{Json, extract::State};

use shopline_core::catalog::Category;

use crate::db::Store;
use crate::error::Result;
use crate::state::AppState;

/// `GET /api/categories`, served through the read-through cache.
pub async fn index<S: Store>(State(state): State<AppState<S>>) -> Result<Json<Vec<Category>>> {
    let categories = state.catalog().categories(state.store()).await?;
    Ok(Json(categories.as_ref().clone()))
}

//! Server-side cart mirror

use axum::{extract::State, Json};
use serde::Deserialize;
use storefront_core::model::{Cart, CartItem};

use crate::error::ApiResult;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CartUpdate {
    pub items: Vec<CartItem>,
}

pub async fn get_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Cart>> {
    Ok(Json(state.store.get_cart(user.id).await?))
}

/// Replace the caller's cart; duplicates collapse to one line
pub async fn put_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(update): Json<CartUpdate>,
) -> ApiResult<Json<Cart>> {
    let mut cart = Cart::default();
    for item in update.items {
        cart.add(item);
    }
    state.store.save_cart(user.id, &cart).await?;
    tracing::debug!(user_id = %user.id, items = cart.items.len(), "Cart saved");
    Ok(Json(cart))
}

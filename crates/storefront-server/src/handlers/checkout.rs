//! Checkout endpoints
//!
//! Prices always come from the catalog; anything price-like the client sends
//! is ignored.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use storefront_core::model::CartItem;
use storefront_payments::{CheckoutKind, CheckoutSession};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProductCheckoutRequest {
    pub product_id: Uuid,
}

/// Cart checkout accepts bare ids or the client's cart items
#[derive(Debug, Deserialize)]
pub struct CartCheckoutRequest {
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl CartCheckoutRequest {
    fn ids(&self) -> Vec<Uuid> {
        self.product_ids
            .iter()
            .copied()
            .chain(self.items.iter().map(|i| i.id))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    pub plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ConsultationCheckoutRequest {
    pub service_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Buy a single product
pub async fn checkout_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ProductCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let payments = state.payments()?;
    let session = payments
        .checkout
        .checkout_products(&user, &[request.product_id], CheckoutKind::Product)
        .await?;
    Ok(Json(session))
}

/// Buy everything in the cart
pub async fn checkout_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CartCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let payments = state.payments()?;
    let session = payments
        .checkout
        .checkout_products(&user, &request.ids(), CheckoutKind::Cart)
        .await?;
    Ok(Json(session))
}

pub async fn checkout_subscription(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SubscriptionCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let payments = state.payments()?;
    let session = payments.checkout.checkout_subscription(&user, request.plan_id).await?;
    Ok(Json(session))
}

pub async fn checkout_consultation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ConsultationCheckoutRequest>,
) -> ApiResult<Json<CheckoutSession>> {
    let payments = state.payments()?;
    let session = payments
        .checkout
        .checkout_consultation(&user, request.service_id, request.scheduled_at, request.notes)
        .await?;
    Ok(Json(session))
}

//! Purchase verification and the caller's purchases

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use storefront_core::model::{Purchase, UserSubscription};
use storefront_core::{PollPolicy, ShopError, VerificationStatus};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{CurrentUser, MaybeUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub session_id: String,
    /// Required when no bearer token is sent
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub session_id: String,
    pub status: VerificationStatus,
    pub settled: bool,
}

impl VerifyResponse {
    fn new(session_id: String, status: VerificationStatus) -> Self {
        Self {
            session_id,
            settled: status.is_settled(),
            status,
        }
    }
}

fn resolve_user(caller: MaybeUser, claimed: Option<Uuid>) -> Result<Uuid, ShopError> {
    match (caller.0, claimed) {
        (Some(user), _) => Ok(user.id),
        (None, Some(id)) => Ok(id),
        (None, None) => Err(ShopError::Validation("user_id is required".into())),
    }
}

fn require_session(session_id: &str) -> Result<(), ShopError> {
    if session_id.trim().is_empty() {
        return Err(ShopError::Validation("session_id is required".into()));
    }
    Ok(())
}

/// One verification attempt; the page polls this
pub async fn verify_purchase(
    State(state): State<AppState>,
    caller: MaybeUser,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    require_session(&request.session_id)?;
    let user_id = resolve_user(caller, request.user_id)?;
    let payments = state.payments()?;

    let status = payments.verifier.verify(&request.session_id, user_id).await?;
    Ok(Json(VerifyResponse::new(request.session_id, status)))
}

/// Verify, waiting on the server (bounded) until the purchase settles
pub async fn wait_for_purchase(
    State(state): State<AppState>,
    caller: MaybeUser,
    Query(request): Query<VerifyRequest>,
) -> ApiResult<Json<VerifyResponse>> {
    require_session(&request.session_id)?;
    let user_id = resolve_user(caller, request.user_id)?;
    let payments = state.payments()?;

    let status = payments
        .verifier
        .wait_for_settlement(&request.session_id, user_id, PollPolicy::default())
        .await?;
    Ok(Json(VerifyResponse::new(request.session_id, status)))
}

/// The caller's purchases
pub async fn list_purchases(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<Purchase>>> {
    Ok(Json(state.store.list_purchases_for_user(user.id).await?))
}

/// The caller's current subscription: the latest entitled one, else the latest
pub async fn current_subscription(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Option<UserSubscription>>> {
    let subscriptions = state.store.list_subscriptions_for_user(user.id).await?;
    let current = subscriptions
        .iter()
        .rev()
        .find(|s| s.is_entitled())
        .or_else(|| subscriptions.last())
        .cloned();
    Ok(Json(current))
}

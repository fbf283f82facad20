//! Sign-up and role introspection

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use storefront_core::model::{AuthUser, Profile, Role};
use storefront_core::{ShopError, SignUpRequest};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user: AuthUser,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_admin: bool,
}

fn validate(request: &SignUpRequest) -> Result<(), ShopError> {
    let email = request.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ShopError::Validation("A valid email is required".into()));
    }
    if request.password.is_empty() {
        return Err(ShopError::Validation("Password is required".into()));
    }
    Ok(())
}

/// Create an account and its profile row
pub async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignUpRequest>,
) -> ApiResult<(StatusCode, Json<SignUpResponse>)> {
    validate(&request)?;

    let session = state.auth.sign_up(&request).await?;

    let email = session.user.email.clone().unwrap_or_else(|| request.email.trim().to_string());
    let profile = Profile::new(session.user.id, email, request.full_name.clone());
    if let Err(e) = state.store.insert_profile(&profile).await {
        tracing::error!(user_id = %profile.id, error = %e, "Account created but profile insert failed");
    } else {
        tracing::info!(user_id = %profile.id, provider = state.auth.name(), "Account created");
    }

    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse {
            user: session.user,
            access_token: session.access_token,
        }),
    ))
}

/// Report the caller's id, email and role
pub async fn debug_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<RoleResponse>> {
    let profile = state.store.get_profile(user.id).await?;
    let role = profile.as_ref().map(|p| p.role);
    Ok(Json(RoleResponse {
        id: user.id,
        email: user.email.or_else(|| profile.map(|p| p.email)),
        role,
        is_admin: role.is_some_and(|r| r.is_admin()),
    }))
}

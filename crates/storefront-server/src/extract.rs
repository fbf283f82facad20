//! Request Extractors
//!
//! Bearer tokens are resolved through the configured [`AuthProvider`]; admin
//! access is decided by the caller's profile role.
//!
//! [`AuthProvider`]: storefront_core::AuthProvider

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use storefront_core::model::{AuthUser, Profile};
use storefront_core::ShopError;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(header) = parts.headers.get("authorization") else {
        return Ok(None);
    };
    let value = header
        .to_str()
        .map_err(|_| ShopError::Unauthorized("Malformed Authorization header".into()))?;
    value
        .strip_prefix("Bearer ")
        .map(Some)
        .ok_or_else(|| {
            ShopError::Unauthorized("Invalid Authorization format. Expected: Bearer <token>".into())
                .into()
        })
}

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?
            .ok_or_else(|| ShopError::Unauthorized("Missing Authorization header".into()))?;
        let user = state.auth.user_from_token(token).await?;
        Ok(CurrentUser(user))
    }
}

/// Caller if a bearer token is present; a bad token is still rejected
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(MaybeUser(Some(state.auth.user_from_token(token).await?))),
            None => Ok(MaybeUser(None)),
        }
    }
}

/// Requires a profile with the `admin` role. Rejects with 403 otherwise.
pub struct RequireAdmin(pub Profile);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        let profile = state.store.get_profile(user.id).await?;
        match profile {
            Some(profile) if profile.role.is_admin() => Ok(RequireAdmin(profile)),
            _ => {
                tracing::warn!(user_id = %user.id, "Admin route denied");
                Err(ShopError::Forbidden("Admin role required".into()).into())
            }
        }
    }
}

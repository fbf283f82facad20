//! Coaching sessions for the signed-in user

use axum::{extract::State, http::StatusCode, Json};
use storefront_core::booking::{book_session, BookingRequest};
use storefront_core::model::CoachingSession;

use crate::error::ApiResult;
use crate::extract::CurrentUser;
use crate::state::AppState;

pub async fn list_my_sessions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Json<Vec<CoachingSession>>> {
    Ok(Json(state.store.list_sessions_for_user(user.id).await?))
}

/// Book against the caller's subscription allotment
pub async fn book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<BookingRequest>,
) -> ApiResult<(StatusCode, Json<CoachingSession>)> {
    let session = book_session(state.store.as_ref(), user.id, request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

//! Coaching Session Booking
//!
//! Sessions are booked three ways: by a subscriber drawing from their monthly
//! allotment, by an admin (optionally against a subscription), or by the
//! payment webhook for a paid consultation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ShopError};
use crate::model::{CoachingSession, SessionStatus, UserSubscription};
use crate::store::{CoachingStore, SubscriptionStore};

pub const DEFAULT_SESSION_TITLE: &str = "Coaching session";
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// A subscriber booking their own session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BookingRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An admin scheduling a session for a user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub subscription_id: Option<Uuid>,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub meeting_url: Option<String>,
}

/// Partial update of a session (admin)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub meeting_url: Option<String>,
}

fn check_duration(duration: Option<u32>) -> Result<u32> {
    match duration {
        Some(0) => Err(ShopError::Validation("duration must be positive".into())),
        Some(d) => Ok(d),
        None => Ok(DEFAULT_DURATION_MINUTES),
    }
}

/// The user's subscription that can still fund a session, if any
pub async fn bookable_subscription<S>(store: &S, user_id: Uuid) -> Result<Option<UserSubscription>>
where
    S: SubscriptionStore + ?Sized,
{
    let subscriptions = store.list_subscriptions_for_user(user_id).await?;
    Ok(subscriptions
        .into_iter()
        .rev()
        .find(|s| s.is_entitled() && s.sessions_remaining > 0))
}

/// Book a session against the caller's active subscription
pub async fn book_session<S>(store: &S, user_id: Uuid, request: BookingRequest) -> Result<CoachingSession>
where
    S: CoachingStore + SubscriptionStore + ?Sized,
{
    if request.scheduled_at <= Utc::now() {
        return Err(ShopError::Validation("scheduled_at must be in the future".into()));
    }
    let duration = check_duration(request.duration_minutes)?;

    let mut subscription = bookable_subscription(store, user_id).await?.ok_or_else(|| {
        ShopError::Forbidden("An active subscription with remaining sessions is required".into())
    })?;

    let title = request.title.unwrap_or_else(|| DEFAULT_SESSION_TITLE.into());
    let mut session = CoachingSession::new(user_id, title, request.scheduled_at, duration);
    session.subscription_id = Some(subscription.id);
    session.notes = request.notes;

    let before = subscription.clone();
    subscription.consume_session();
    store.update_subscription(&subscription).await?;

    if let Err(e) = store.insert_session(&session).await {
        if let Err(restore) = store.update_subscription(&before).await {
            tracing::error!(
                subscription_id = %before.id,
                error = %restore,
                "Failed to restore session allotment"
            );
        }
        return Err(e);
    }

    tracing::info!(
        session_id = %session.id,
        user_id = %user_id,
        sessions_remaining = subscription.sessions_remaining,
        "Booked coaching session"
    );
    Ok(session)
}

/// Admin scheduling. When tied to a subscription the allotment is decremented
/// (never below zero) even if it is already exhausted.
pub async fn schedule_session<S>(store: &S, request: ScheduleRequest) -> Result<CoachingSession>
where
    S: CoachingStore + SubscriptionStore + ?Sized,
{
    if request.title.trim().is_empty() {
        return Err(ShopError::Validation("title is required".into()));
    }
    let duration = check_duration(request.duration_minutes)?;

    let mut session =
        CoachingSession::new(request.user_id, request.title, request.scheduled_at, duration);
    session.notes = request.notes;
    session.meeting_url = request.meeting_url;

    if let Some(subscription_id) = request.subscription_id {
        let mut subscription = store
            .get_subscription(subscription_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("Subscription {subscription_id}")))?;
        if subscription.user_id != request.user_id {
            return Err(ShopError::Validation(
                "subscription belongs to a different user".into(),
            ));
        }
        subscription.consume_session();
        store.update_subscription(&subscription).await?;
        session.subscription_id = Some(subscription.id);
    }

    store.insert_session(&session).await?;
    tracing::info!(session_id = %session.id, user_id = %session.user_id, "Scheduled coaching session");
    Ok(session)
}

/// Apply an admin update to a session
pub async fn update_session<S>(store: &S, id: Uuid, update: SessionUpdate) -> Result<CoachingSession>
where
    S: CoachingStore + ?Sized,
{
    let mut session = store
        .get_session(id)
        .await?
        .ok_or_else(|| ShopError::NotFound(format!("Session {id}")))?;

    if let Some(status) = update.status {
        session.status = status;
    }
    if let Some(at) = update.scheduled_at {
        session.scheduled_at = at;
    }
    if update.notes.is_some() {
        session.notes = update.notes;
    }
    if update.meeting_url.is_some() {
        session.meeting_url = update.meeting_url;
    }

    store.update_session(&session).await?;
    Ok(session)
}

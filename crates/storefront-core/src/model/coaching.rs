use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-time paid consultation offered for booking
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoachingService {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub duration_minutes: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Scheduled,
    Completed,
    Canceled,
    NoShow,
}

/// A scheduled one-on-one appointment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoachingSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Subscription the session was drawn from, if any
    #[serde(default)]
    pub subscription_id: Option<Uuid>,
    /// Paid consultation service, if any
    #[serde(default)]
    pub service_id: Option<Uuid>,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub meeting_url: Option<String>,
    /// Checkout session that paid for this booking
    #[serde(default)]
    pub stripe_session_id: Option<String>,
}

impl CoachingSession {
    pub fn new(
        user_id: Uuid,
        title: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            subscription_id: None,
            service_id: None,
            title: title.into(),
            scheduled_at,
            duration_minutes,
            status: SessionStatus::Scheduled,
            notes: None,
            meeting_url: None,
            stripe_session_id: None,
        }
    }
}

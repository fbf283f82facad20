use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monthly coaching subscription offered for sale
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoachingPlan {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Monthly price in USD
    pub price: Decimal,
    pub sessions_per_month: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Subscription status as reported by the payment processor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
    Unpaid,
    Trialing,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Trialing => "trialing",
        }
    }

    /// Map a processor status string. Statuses without a local counterpart
    /// (`incomplete`, `paused`, ...) are treated as unpaid.
    pub fn from_processor(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "canceled" | "incomplete_expired" => SubscriptionStatus::Canceled,
            "past_due" => SubscriptionStatus::PastDue,
            "trialing" => SubscriptionStatus::Trialing,
            _ => SubscriptionStatus::Unpaid,
        }
    }

    /// Whether the subscriber may book sessions
    pub fn is_entitled(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's subscription to a coaching plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Uuid,
    pub stripe_subscription_id: String,
    pub status: SubscriptionStatus,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    /// Sessions left in the current billing period
    #[serde(default)]
    pub sessions_remaining: u32,
}

impl UserSubscription {
    pub fn is_entitled(&self) -> bool {
        self.status.is_entitled()
    }

    /// Draw one session from the allotment. Floors at zero.
    pub fn consume_session(&mut self) {
        self.sessions_remaining = self.sessions_remaining.saturating_sub(1);
    }

    /// Apply a processor update. A new billing period restores the allotment.
    pub fn apply_period(
        &mut self,
        status: SubscriptionStatus,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        allotment: u32,
    ) {
        if period_start > self.current_period_start {
            self.sessions_remaining = allotment;
        }
        self.status = status;
        self.current_period_start = period_start;
        self.current_period_end = period_end;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subscription(remaining: u32) -> UserSubscription {
        let now = Utc::now();
        UserSubscription {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            stripe_subscription_id: "sub_123".into(),
            status: SubscriptionStatus::Active,
            current_period_start: now,
            current_period_end: now + Duration::days(30),
            sessions_remaining: remaining,
        }
    }

    #[test]
    fn test_consume_floors_at_zero() {
        let mut sub = subscription(2);
        sub.consume_session();
        assert_eq!(sub.sessions_remaining, 1);
        sub.consume_session();
        sub.consume_session();
        sub.consume_session();
        assert_eq!(sub.sessions_remaining, 0);
    }

    #[test]
    fn test_new_period_restores_allotment() {
        let mut sub = subscription(0);
        let start = sub.current_period_end;
        sub.apply_period(SubscriptionStatus::Active, start, start + Duration::days(30), 4);
        assert_eq!(sub.sessions_remaining, 4);

        // Same period, status change only
        sub.consume_session();
        sub.apply_period(SubscriptionStatus::PastDue, start, start + Duration::days(30), 4);
        assert_eq!(sub.sessions_remaining, 3);
        assert!(!sub.is_entitled());
    }

    #[test]
    fn test_processor_status_mapping() {
        assert_eq!(SubscriptionStatus::from_processor("past_due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::from_processor("incomplete"), SubscriptionStatus::Unpaid);
        assert!(SubscriptionStatus::from_processor("trialing").is_entitled());
    }
}

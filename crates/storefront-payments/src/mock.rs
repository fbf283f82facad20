//! Mock Payment Gateway
//!
//! For testing and demo purposes. Sessions live in memory and are never paid
//! until [`MockGateway::mark_paid`] is called.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use storefront_core::ShopError;
use tokio::sync::Mutex;

use crate::error::{PaymentError, Result};
use crate::gateway::{
    HostedSession, PaymentGateway, SessionMode, SessionRequest, SessionSnapshot,
    SubscriptionSnapshot,
};

struct MockSession {
    request: SessionRequest,
    paid: bool,
    subscription_id: Option<String>,
}

#[derive(Default)]
struct MockState {
    sessions: HashMap<String, MockSession>,
    order: Vec<String>,
    subscriptions: HashMap<String, SubscriptionSnapshot>,
    failing: bool,
}

/// In-memory gateway
pub struct MockGateway {
    state: Mutex<MockState>,
    counter: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            counter: AtomicU64::new(0),
        }
    }

    /// Make every subsequent `create_session` fail
    pub async fn set_failing(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    /// Mark a session paid. Subscription-mode sessions get a fresh active
    /// subscription; its id is returned.
    pub async fn mark_paid(&self, session_id: &str) -> Result<Option<String>> {
        let mut state = self.state.lock().await;
        let MockState {
            sessions,
            subscriptions,
            ..
        } = &mut *state;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| ShopError::NotFound(format!("Checkout session {session_id}")))?;
        session.paid = true;

        if session.request.mode == SessionMode::Subscription && session.subscription_id.is_none() {
            let id = format!("sub_mock_{}", self.counter.fetch_add(1, Ordering::Relaxed));
            let now = Utc::now();
            subscriptions.insert(
                id.clone(),
                SubscriptionSnapshot {
                    id: id.clone(),
                    status: "active".into(),
                    current_period_start: now,
                    current_period_end: now + Duration::days(30),
                    metadata: session.request.metadata.clone(),
                },
            );
            session.subscription_id = Some(id);
        }
        Ok(session.subscription_id.clone())
    }

    /// Requests seen so far, oldest first
    pub async fn created_requests(&self) -> Vec<SessionRequest> {
        let state = self.state.lock().await;
        state
            .order
            .iter()
            .filter_map(|id| state.sessions.get(id).map(|s| s.request.clone()))
            .collect()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<HostedSession> {
        let mut state = self.state.lock().await;
        if state.failing {
            return Err(PaymentError::Stripe("mock gateway unavailable".into()));
        }

        let id = format!("cs_test_mock_{}", self.counter.fetch_add(1, Ordering::Relaxed));
        let url = format!("https://checkout.stripe.test/pay/{id}");
        state.order.push(id.clone());
        state.sessions.insert(
            id.clone(),
            MockSession {
                request,
                paid: false,
                subscription_id: None,
            },
        );
        Ok(HostedSession { id, url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let state = self.state.lock().await;
        let session = state
            .sessions
            .get(session_id)
            .ok_or_else(|| ShopError::NotFound(format!("Checkout session {session_id}")))?;

        Ok(SessionSnapshot {
            id: session_id.to_string(),
            mode: session.request.mode,
            paid: session.paid,
            metadata: session.request.metadata.clone(),
            line_item_amounts: session.request.line_items.iter().map(|l| l.amount).collect(),
            subscription_id: session.subscription_id.clone(),
        })
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionSnapshot> {
        self.state
            .lock()
            .await
            .subscriptions
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| ShopError::NotFound(format!("Subscription {subscription_id}")).into())
    }

    fn name(&self) -> &str {
        "MockGateway"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::LineItem;
    use rust_decimal_macros::dec;

    fn request(mode: SessionMode) -> SessionRequest {
        SessionRequest {
            mode,
            line_items: vec![LineItem {
                name: "Guide".into(),
                description: None,
                amount: dec!(10),
                recurring_monthly: mode == SessionMode::Subscription,
            }],
            customer_email: None,
            client_reference_id: None,
            success_url: "http://localhost/ok".into(),
            cancel_url: "http://localhost/cancel".into(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let gateway = MockGateway::new();
        let hosted = gateway.create_session(request(SessionMode::Payment)).await.unwrap();

        let snapshot = gateway.retrieve_session(&hosted.id).await.unwrap();
        assert!(!snapshot.paid);
        assert_eq!(snapshot.line_item_amounts, vec![dec!(10)]);

        assert_eq!(gateway.mark_paid(&hosted.id).await.unwrap(), None);
        assert!(gateway.retrieve_session(&hosted.id).await.unwrap().paid);
    }

    #[tokio::test]
    async fn test_subscription_session_creates_subscription() {
        let gateway = MockGateway::new();
        let hosted = gateway.create_session(request(SessionMode::Subscription)).await.unwrap();
        let sub_id = gateway.mark_paid(&hosted.id).await.unwrap().unwrap();

        let sub = gateway.retrieve_subscription(&sub_id).await.unwrap();
        assert_eq!(sub.status, "active");
    }

    #[tokio::test]
    async fn test_failing_gateway() {
        let gateway = MockGateway::new();
        gateway.set_failing(true).await;
        assert!(gateway.create_session(request(SessionMode::Payment)).await.is_err());
        assert!(gateway.created_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let gateway = MockGateway::new();
        let err = gateway.retrieve_session("cs_test_unknown").await.unwrap_err();
        assert!(matches!(err, PaymentError::Shop(ShopError::NotFound(_))));
    }
}

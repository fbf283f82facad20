//! Stripe Webhook Handling
//!
//! Reconciles purchases, subscriptions and paid consultations from processor
//! events. Every write is keyed so a redelivered event changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use stripe::{
    CheckoutSessionMode, CheckoutSessionPaymentStatus, Event, EventObject, EventType, Webhook,
};
use storefront_core::booking::{DEFAULT_DURATION_MINUTES, DEFAULT_SESSION_TITLE};
use storefront_core::model::{
    CoachingSession, Purchase, PurchaseStatus, SubscriptionStatus, UserSubscription,
};
use storefront_core::Store;
use uuid::Uuid;

use crate::error::{PaymentError, Result};
use crate::gateway::{from_unix, PaymentGateway, SessionMode};
use crate::metadata::{CheckoutKind, CheckoutMetadata};
use crate::signature::verify_signature;
use crate::verify::CompletionBus;

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq)]
pub enum WebhookEvent {
    /// Checkout paid - complete purchases, start a subscription or book a
    /// consultation
    CheckoutCompleted {
        session_id: String,
        mode: SessionMode,
        metadata: CheckoutMetadata,
        subscription_id: Option<String>,
    },

    /// Checkout finished but the payment has not cleared yet (delayed
    /// methods). A later async payment event settles it.
    PaymentPending { session_id: String },

    /// Checkout abandoned or its delayed payment failed - fail its pending
    /// purchases
    CheckoutExpired {
        session_id: String,
        purchase_ids: Vec<Uuid>,
    },

    /// Subscription created or updated
    SubscriptionUpdated {
        subscription_id: String,
        status: String,
        period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    },

    /// Subscription deleted
    SubscriptionCancelled { subscription_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// How a checkout session event moves the session along
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionTransition {
    Completed,
    AsyncSucceeded,
    AsyncFailed,
    Expired,
}

impl SessionTransition {
    fn from_type(event_type: &str) -> Option<Self> {
        match event_type {
            "checkout.session.completed" => Some(Self::Completed),
            "checkout.session.async_payment_succeeded" => Some(Self::AsyncSucceeded),
            "checkout.session.async_payment_failed" => Some(Self::AsyncFailed),
            "checkout.session.expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// The parts of a checkout session reconciliation needs, from either decoder
struct SessionFields {
    id: String,
    mode: SessionMode,
    paid: bool,
    metadata: HashMap<String, String>,
    subscription_id: Option<String>,
}

fn session_event(event_type: &str, transition: SessionTransition, session: SessionFields) -> WebhookEvent {
    match transition {
        SessionTransition::Completed | SessionTransition::AsyncSucceeded => {
            if transition == SessionTransition::Completed && !session.paid {
                return WebhookEvent::PaymentPending { session_id: session.id };
            }
            match CheckoutMetadata::from_map(&session.metadata) {
                Ok(metadata) => WebhookEvent::CheckoutCompleted {
                    session_id: session.id,
                    mode: session.mode,
                    metadata,
                    subscription_id: session.subscription_id,
                },
                Err(e) => {
                    // Sessions created outside the storefront share the endpoint
                    tracing::warn!(
                        session_id = %session.id,
                        event_type,
                        error = %e,
                        "Ignoring checkout without storefront metadata"
                    );
                    WebhookEvent::Other { event_type: event_type.to_string() }
                }
            }
        }

        SessionTransition::AsyncFailed | SessionTransition::Expired => WebhookEvent::CheckoutExpired {
            purchase_ids: CheckoutMetadata::from_map(&session.metadata)
                .map(|m| m.purchase_ids)
                .unwrap_or_default(),
            session_id: session.id,
        },
    }
}

fn subscription_event(
    deleted: bool,
    subscription_id: String,
    status: String,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<WebhookEvent> {
    if deleted {
        return Ok(WebhookEvent::SubscriptionCancelled { subscription_id });
    }
    let period = match (start, end) {
        (Some(start), Some(end)) => Some((from_unix(start)?, from_unix(end)?)),
        _ => None,
    };
    Ok(WebhookEvent::SubscriptionUpdated {
        subscription_id,
        status,
        period,
    })
}

/// Map a typed processor event
fn from_stripe_event(event: &Event) -> Result<WebhookEvent> {
    // Wire name, e.g. "checkout.session.completed"
    let event_type = match serde_json::to_value(&event.type_)? {
        serde_json::Value::String(name) => name,
        other => other.to_string(),
    };
    tracing::debug!(event_id = %event.id, event_type = %event_type, "Decoded webhook event");

    if let Some(transition) = SessionTransition::from_type(&event_type) {
        let EventObject::CheckoutSession(session) = &event.data.object else {
            return Err(PaymentError::WebhookParse("Invalid checkout session data".into()));
        };
        let fields = SessionFields {
            id: session.id.to_string(),
            mode: match session.mode {
                CheckoutSessionMode::Subscription => SessionMode::Subscription,
                _ => SessionMode::Payment,
            },
            paid: matches!(
                session.payment_status,
                CheckoutSessionPaymentStatus::Paid | CheckoutSessionPaymentStatus::NoPaymentRequired
            ),
            metadata: session.metadata.clone().unwrap_or_default(),
            subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
        };
        return Ok(session_event(&event_type, transition, fields));
    }

    match event.type_ {
        EventType::CustomerSubscriptionCreated
        | EventType::CustomerSubscriptionUpdated
        | EventType::CustomerSubscriptionDeleted => {
            let EventObject::Subscription(sub) = &event.data.object else {
                return Err(PaymentError::WebhookParse("Invalid subscription data".into()));
            };
            subscription_event(
                event.type_ == EventType::CustomerSubscriptionDeleted,
                sub.id.to_string(),
                sub.status.to_string(),
                Some(sub.current_period_start),
                Some(sub.current_period_end),
            )
        }
        _ => Ok(WebhookEvent::Other { event_type }),
    }
}

#[derive(Deserialize)]
struct Envelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EnvelopeData,
}

#[derive(Deserialize)]
struct EnvelopeData {
    object: serde_json::Value,
}

#[derive(Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
    /// Either an id or an expanded object
    #[serde(default)]
    subscription: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct SubscriptionObject {
    id: String,
    status: String,
    #[serde(default)]
    current_period_start: Option<i64>,
    #[serde(default)]
    current_period_end: Option<i64>,
}

/// Decode a raw event body without the typed processor models
pub fn parse_payload(payload: &[u8]) -> Result<WebhookEvent> {
    let envelope: Envelope = serde_json::from_slice(payload)?;
    let event_type = envelope.event_type.as_str();
    tracing::debug!(event_id = %envelope.id, event_type, "Decoded webhook envelope");

    if let Some(transition) = SessionTransition::from_type(event_type) {
        let session: SessionObject = serde_json::from_value(envelope.data.object)?;
        let fields = SessionFields {
            mode: match session.mode.as_deref() {
                Some("subscription") => SessionMode::Subscription,
                _ => SessionMode::Payment,
            },
            paid: matches!(session.payment_status.as_deref(), Some("paid" | "no_payment_required")),
            subscription_id: session.subscription.as_ref().and_then(|s| match s {
                serde_json::Value::String(id) => Some(id.clone()),
                other => other.get("id").and_then(|v| v.as_str()).map(str::to_string),
            }),
            id: session.id,
            metadata: session.metadata,
        };
        return Ok(session_event(event_type, transition, fields));
    }

    match event_type {
        "customer.subscription.created" | "customer.subscription.updated" | "customer.subscription.deleted" => {
            let sub: SubscriptionObject = serde_json::from_value(envelope.data.object)?;
            subscription_event(
                event_type == "customer.subscription.deleted",
                sub.id,
                sub.status,
                sub.current_period_start,
                sub.current_period_end,
            )
        }
        other => Ok(WebhookEvent::Other {
            event_type: other.to_string(),
        }),
    }
}

/// Webhook handler
pub struct WebhookHandler<S: Store + ?Sized> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    bus: CompletionBus,
    webhook_secret: String,
}

impl<S: Store + ?Sized> WebhookHandler<S> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        bus: CompletionBus,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            bus,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verify webhook signature and parse event.
    ///
    /// async-stripe decodes the event first. Events it cannot model (a newer
    /// API version) are verified by hand and decoded from the raw body.
    pub fn parse_event(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        let body = std::str::from_utf8(payload)
            .map_err(|e| PaymentError::WebhookParse(format!("payload is not UTF-8: {e}")))?;

        match Webhook::construct_event(body, signature, &self.webhook_secret) {
            Ok(event) => return from_stripe_event(&event),
            Err(e) => {
                tracing::debug!(stripe_error = %e, "Typed webhook decoding failed, verifying manually");
            }
        }

        verify_signature(payload, signature, &self.webhook_secret, Utc::now().timestamp())?;
        parse_payload(payload)
    }

    /// Process a webhook event
    pub async fn handle(&self, event: WebhookEvent) -> Result<()> {
        match event {
            WebhookEvent::CheckoutCompleted {
                session_id,
                mode,
                metadata,
                subscription_id,
            } => {
                tracing::info!(
                    session_id = %session_id,
                    checkout_type = metadata.kind.as_str(),
                    user_id = %metadata.user_id,
                    "Processing completed checkout"
                );
                if mode == SessionMode::Subscription || metadata.kind == CheckoutKind::Subscription {
                    let subscription_id = subscription_id.ok_or_else(|| {
                        PaymentError::WebhookParse("subscription checkout without subscription".into())
                    })?;
                    self.start_subscription(&metadata, &subscription_id).await?;
                } else if metadata.kind == CheckoutKind::Consultation {
                    self.book_consultation(&session_id, &metadata).await?;
                } else {
                    self.complete_purchases(&session_id, &metadata).await;
                }
                self.bus.publish(&session_id);
            }

            WebhookEvent::PaymentPending { session_id } => {
                tracing::info!(session_id = %session_id, "Checkout awaiting payment, leaving purchases pending");
            }

            WebhookEvent::CheckoutExpired {
                session_id,
                purchase_ids,
            } => self.expire_session(&session_id, &purchase_ids).await?,

            WebhookEvent::SubscriptionUpdated {
                subscription_id,
                status,
                period,
            } => self.update_subscription(&subscription_id, &status, period).await?,

            WebhookEvent::SubscriptionCancelled { subscription_id } => {
                match self.store.find_subscription_by_stripe_id(&subscription_id).await? {
                    Some(mut sub) => {
                        sub.status = SubscriptionStatus::Canceled;
                        self.store.update_subscription(&sub).await?;
                        tracing::info!(subscription_id = %subscription_id, user_id = %sub.user_id, "Cancelled subscription");
                    }
                    None => tracing::info!(subscription_id = %subscription_id, "Cancelled subscription not on record"),
                }
            }

            WebhookEvent::Other { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event");
            }
        }
        Ok(())
    }

    /// Complete one purchase per product. Errors are per product and do not
    /// stop the rest.
    async fn complete_purchases(&self, session_id: &str, meta: &CheckoutMetadata) {
        for product_id in &meta.product_ids {
            if let Err(e) = self.complete_one(session_id, meta, *product_id).await {
                tracing::error!(
                    session_id,
                    product_id = %product_id,
                    error = %e,
                    "Failed to complete purchase"
                );
            }
        }
    }

    async fn complete_one(&self, session_id: &str, meta: &CheckoutMetadata, product_id: Uuid) -> Result<()> {
        let rows = self.store.find_purchases(meta.user_id, product_id).await?;

        if rows.iter().any(Purchase::is_completed) {
            tracing::debug!(session_id, product_id = %product_id, "Purchase already completed");
            return Ok(());
        }

        let belongs = |p: &&Purchase| {
            p.stripe_session_id.as_deref() == Some(session_id) || meta.purchase_ids.contains(&p.id)
        };
        let pending = rows
            .iter()
            .filter(|p| p.is_pending())
            .find(belongs)
            .or_else(|| rows.iter().find(|p| p.is_pending()));

        match pending {
            Some(purchase) => {
                let mut purchase = purchase.clone();
                purchase.status = PurchaseStatus::Completed;
                purchase.stripe_session_id = Some(session_id.to_string());
                purchase.updated_at = Utc::now();
                self.store.update_purchase(&purchase).await?;
                tracing::info!(purchase_id = %purchase.id, product_id = %product_id, "Completed purchase");
            }
            None => {
                let product = self
                    .store
                    .get_product(product_id)
                    .await?
                    .ok_or_else(|| storefront_core::ShopError::NotFound(format!("Product {product_id}")))?;
                let purchase = Purchase::completed(meta.user_id, product_id, product.price, session_id, false);
                self.store.insert_purchase(&purchase).await?;
                tracing::info!(purchase_id = %purchase.id, product_id = %product_id, "Recorded purchase with no pending row");
            }
        }
        Ok(())
    }

    async fn start_subscription(&self, meta: &CheckoutMetadata, subscription_id: &str) -> Result<()> {
        let plan_id = meta
            .plan_id
            .ok_or_else(|| PaymentError::WebhookParse("subscription checkout without plan_id".into()))?;
        let allotment = match self.store.get_plan(plan_id).await? {
            Some(plan) => plan.sessions_per_month,
            None => {
                tracing::warn!(plan_id = %plan_id, "Subscribed plan no longer exists");
                0
            }
        };

        let remote = self.gateway.retrieve_subscription(subscription_id).await?;
        let status = SubscriptionStatus::from_processor(&remote.status);

        let subscription = match self.store.find_subscription_by_stripe_id(subscription_id).await? {
            Some(mut existing) => {
                existing.apply_period(status, remote.current_period_start, remote.current_period_end, allotment);
                existing
            }
            None => UserSubscription {
                id: Uuid::new_v4(),
                user_id: meta.user_id,
                plan_id,
                stripe_subscription_id: subscription_id.to_string(),
                status,
                current_period_start: remote.current_period_start,
                current_period_end: remote.current_period_end,
                sessions_remaining: allotment,
            },
        };
        self.store.upsert_subscription(&subscription).await?;

        tracing::info!(
            subscription_id,
            user_id = %meta.user_id,
            plan_id = %plan_id,
            status = %status,
            sessions = subscription.sessions_remaining,
            "Recorded subscription"
        );
        Ok(())
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        status: &str,
        period: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<()> {
        let Some(mut sub) = self.store.find_subscription_by_stripe_id(subscription_id).await? else {
            tracing::info!(subscription_id, status, "Subscription update for unknown subscription");
            return Ok(());
        };

        let allotment = self
            .store
            .get_plan(sub.plan_id)
            .await?
            .map_or(sub.sessions_remaining, |p| p.sessions_per_month);
        let (start, end) = period.unwrap_or((sub.current_period_start, sub.current_period_end));
        sub.apply_period(SubscriptionStatus::from_processor(status), start, end, allotment);
        self.store.update_subscription(&sub).await?;

        tracing::info!(
            subscription_id,
            status = %sub.status,
            sessions = sub.sessions_remaining,
            "Updated subscription"
        );
        Ok(())
    }

    async fn book_consultation(&self, session_id: &str, meta: &CheckoutMetadata) -> Result<()> {
        if self.store.find_session_by_checkout(session_id).await?.is_some() {
            tracing::debug!(session_id, "Consultation already booked");
            return Ok(());
        }
        let scheduled_at = meta
            .scheduled_at
            .ok_or_else(|| PaymentError::WebhookParse("consultation without scheduled_at".into()))?;

        let service = match meta.service_id {
            Some(id) => self.store.get_service(id).await?,
            None => None,
        };
        let (title, duration) = service.as_ref().map_or_else(
            || (DEFAULT_SESSION_TITLE.to_string(), DEFAULT_DURATION_MINUTES),
            |s| (s.name.clone(), s.duration_minutes),
        );

        let mut session = CoachingSession::new(meta.user_id, title, scheduled_at, duration);
        session.service_id = meta.service_id;
        session.notes = meta.notes.clone();
        session.stripe_session_id = Some(session_id.to_string());
        self.store.insert_session(&session).await?;

        tracing::info!(
            session_id,
            coaching_session_id = %session.id,
            user_id = %meta.user_id,
            scheduled_at = %scheduled_at,
            "Booked paid consultation"
        );
        Ok(())
    }

    async fn expire_session(&self, session_id: &str, purchase_ids: &[Uuid]) -> Result<()> {
        let mut rows = self.store.list_purchases_by_session(session_id).await?;
        for id in purchase_ids {
            if rows.iter().any(|p| p.id == *id) {
                continue;
            }
            if let Some(purchase) = self.store.get_purchase(*id).await? {
                rows.push(purchase);
            }
        }

        let mut failed = 0usize;
        for mut purchase in rows.into_iter().filter(Purchase::is_pending) {
            purchase.status = PurchaseStatus::Failed;
            purchase.updated_at = Utc::now();
            match self.store.update_purchase(&purchase).await {
                Ok(()) => failed += 1,
                Err(e) => tracing::error!(purchase_id = %purchase.id, error = %e, "Failed to expire purchase"),
            }
        }

        tracing::info!(session_id, failed, "Expired checkout session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{CheckoutService, CheckoutUrls};
    use crate::mock::MockGateway;
    use crate::signature::sign_payload;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use storefront_core::model::{AuthUser, CoachingPlan, CoachingService, Product};
    use storefront_core::{CatalogStore, CoachingStore, MemoryStore, PurchaseStore, SubscriptionStore};

    const SECRET: &str = "whsec_test";

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<MockGateway>,
        checkout: CheckoutService<MemoryStore>,
        handler: WebhookHandler<MemoryStore>,
        user: AuthUser,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(MockGateway::new());
        Fixture {
            checkout: CheckoutService::new(store.clone(), gateway.clone(), CheckoutUrls::new("http://shop.test"), false),
            handler: WebhookHandler::new(store.clone(), gateway.clone(), CompletionBus::new(), SECRET),
            store,
            gateway,
            user: AuthUser { id: Uuid::new_v4(), email: None },
        }
    }

    fn completed_event(session_id: &str, metadata: &CheckoutMetadata) -> serde_json::Value {
        json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "mode": "payment",
                "payment_status": "paid",
                "metadata": metadata.to_map(),
            }}
        })
    }

    async fn deliver(f: &Fixture, event: &serde_json::Value) -> Result<()> {
        let payload = serde_json::to_vec(event).unwrap();
        let header = sign_payload(&payload, SECRET, Utc::now().timestamp()).unwrap();
        let parsed = f.handler.parse_event(&payload, &header)?;
        f.handler.handle(parsed).await
    }

    async fn cart_checkout(f: &Fixture) -> (String, CheckoutMetadata, Vec<Product>) {
        let products = vec![Product::new("Guide", dec!(10)), Product::new("Templates", dec!(20))];
        for p in &products {
            f.store.insert_product(p).await.unwrap();
        }
        let ids: Vec<_> = products.iter().map(|p| p.id).collect();
        let session = f.checkout.checkout_products(&f.user, &ids, CheckoutKind::Cart).await.unwrap();
        let request = f.gateway.created_requests().await.pop().unwrap();
        let metadata = CheckoutMetadata::from_map(&request.metadata).unwrap();
        (session.session_id, metadata, products)
    }

    #[tokio::test]
    async fn test_cart_completed_and_redelivered() {
        let f = fixture();
        let (session_id, metadata, products) = cart_checkout(&f).await;
        let event = completed_event(&session_id, &metadata);

        deliver(&f, &event).await.unwrap();
        deliver(&f, &event).await.unwrap();

        for p in &products {
            let rows = f.store.find_purchases(f.user.id, p.id).await.unwrap();
            assert_eq!(rows.len(), 1);
            assert!(rows[0].is_completed());
            assert_eq!(rows[0].amount, p.price);
        }
    }

    #[tokio::test]
    async fn test_completed_without_pending_rows_inserts() {
        let f = fixture();
        let product = Product::new("Guide", dec!(15));
        f.store.insert_product(&product).await.unwrap();
        let mut metadata = CheckoutMetadata::new(CheckoutKind::Product, f.user.id);
        metadata.product_ids = vec![product.id, Uuid::new_v4()];

        deliver(&f, &completed_event("cs_direct", &metadata)).await.unwrap();

        let rows = f.store.list_purchases_by_session("cs_direct").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, dec!(15));
    }

    #[tokio::test]
    async fn test_bad_signature_changes_nothing() {
        let f = fixture();
        let (session_id, metadata, _) = cart_checkout(&f).await;
        let payload = serde_json::to_vec(&completed_event(&session_id, &metadata)).unwrap();
        let header = sign_payload(&payload, "whsec_wrong", Utc::now().timestamp()).unwrap();

        let result = f.handler.parse_event(&payload, &header);
        assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
        let rows = f.store.list_purchases_by_session(&session_id).await.unwrap();
        assert!(rows.iter().all(Purchase::is_pending));
    }

    #[tokio::test]
    async fn test_expired_fails_only_pending() {
        let f = fixture();
        let (session_id, metadata, products) = cart_checkout(&f).await;

        let mut rows = f.store.find_purchases(f.user.id, products[0].id).await.unwrap();
        rows[0].status = PurchaseStatus::Completed;
        f.store.update_purchase(&rows[0]).await.unwrap();

        let event = json!({
            "id": "evt_2",
            "type": "checkout.session.expired",
            "data": { "object": { "id": session_id, "metadata": metadata.to_map() } }
        });
        deliver(&f, &event).await.unwrap();

        let first = f.store.find_purchases(f.user.id, products[0].id).await.unwrap();
        let second = f.store.find_purchases(f.user.id, products[1].id).await.unwrap();
        assert_eq!(first[0].status, PurchaseStatus::Completed);
        assert_eq!(second[0].status, PurchaseStatus::Failed);
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let f = fixture();
        let plan = CoachingPlan {
            id: Uuid::new_v4(),
            name: "Monthly".into(),
            description: None,
            price: dec!(99),
            sessions_per_month: 4,
            active: true,
        };
        f.store.insert_plan(&plan).await.unwrap();
        let session = f.checkout.checkout_subscription(&f.user, plan.id).await.unwrap();
        let sub_id = f.gateway.mark_paid(&session.session_id).await.unwrap().unwrap();
        let request = f.gateway.created_requests().await.pop().unwrap();

        let completed = json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session.session_id,
                "mode": "subscription",
                "payment_status": "paid",
                "subscription": sub_id,
                "metadata": request.metadata,
            }}
        });
        deliver(&f, &completed).await.unwrap();

        let mut sub = f.store.find_subscription_by_stripe_id(&sub_id).await.unwrap().unwrap();
        assert_eq!(sub.sessions_remaining, 4);
        sub.consume_session();
        f.store.update_subscription(&sub).await.unwrap();

        // Redelivery keeps the consumed count
        deliver(&f, &completed).await.unwrap();
        let sub = f.store.find_subscription_by_stripe_id(&sub_id).await.unwrap().unwrap();
        assert_eq!(sub.sessions_remaining, 3);

        let renewed_start = sub.current_period_end;
        let updated = json!({
            "id": "evt_4",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": sub_id,
                "status": "active",
                "current_period_start": renewed_start.timestamp(),
                "current_period_end": (renewed_start + Duration::days(30)).timestamp(),
            }}
        });
        deliver(&f, &updated).await.unwrap();
        let sub = f.store.find_subscription_by_stripe_id(&sub_id).await.unwrap().unwrap();
        assert_eq!(sub.sessions_remaining, 4);

        let deleted = json!({
            "id": "evt_5",
            "type": "customer.subscription.deleted",
            "data": { "object": { "id": sub_id, "status": "canceled" } }
        });
        deliver(&f, &deleted).await.unwrap();
        let sub = f.store.find_subscription_by_stripe_id(&sub_id).await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_consultation_booked_once() {
        let f = fixture();
        let service = CoachingService {
            id: Uuid::new_v4(),
            name: "Strategy call".into(),
            description: None,
            price: dec!(150),
            duration_minutes: 45,
            active: true,
        };
        f.store.insert_service(&service).await.unwrap();
        let mut metadata = CheckoutMetadata::new(CheckoutKind::Consultation, f.user.id);
        metadata.service_id = Some(service.id);
        metadata.scheduled_at = Some(Utc::now() + Duration::days(2));

        let event = completed_event("cs_consult", &metadata);
        deliver(&f, &event).await.unwrap();
        deliver(&f, &event).await.unwrap();

        let sessions = f.store.list_sessions_for_user(f.user.id).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Strategy call");
        assert_eq!(sessions[0].duration_minutes, 45);
    }

    fn session_event_json(event_type: &str, session_id: &str, payment_status: &str, metadata: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "evt_6",
            "type": event_type,
            "data": { "object": {
                "id": session_id,
                "mode": "payment",
                "payment_status": payment_status,
                "metadata": metadata,
            }}
        })
    }

    #[tokio::test]
    async fn test_unpaid_completion_waits_for_async_payment() {
        let f = fixture();
        let (session_id, metadata, _) = cart_checkout(&f).await;
        let map = serde_json::to_value(metadata.to_map()).unwrap();

        let unpaid = session_event_json("checkout.session.completed", &session_id, "unpaid", map.clone());
        deliver(&f, &unpaid).await.unwrap();
        let rows = f.store.list_purchases_by_session(&session_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(Purchase::is_pending));

        let cleared = session_event_json("checkout.session.async_payment_succeeded", &session_id, "paid", map);
        deliver(&f, &cleared).await.unwrap();
        let rows = f.store.list_purchases_by_session(&session_id).await.unwrap();
        assert!(rows.iter().all(Purchase::is_completed));
    }

    #[tokio::test]
    async fn test_async_payment_failure_fails_pending() {
        let f = fixture();
        let (session_id, metadata, _) = cart_checkout(&f).await;
        let map = serde_json::to_value(metadata.to_map()).unwrap();

        let failed = session_event_json("checkout.session.async_payment_failed", &session_id, "unpaid", map);
        deliver(&f, &failed).await.unwrap();

        let rows = f.store.list_purchases_by_session(&session_id).await.unwrap();
        assert!(rows.iter().all(|p| p.status == PurchaseStatus::Failed));
    }

    #[tokio::test]
    async fn test_foreign_checkout_is_ignored() {
        let f = fixture();
        let event = session_event_json("checkout.session.completed", "cs_other_app", "paid", json!({ "order": "42" }));
        let payload = serde_json::to_vec(&event).unwrap();

        let parsed = parse_payload(&payload).unwrap();
        assert_eq!(
            parsed,
            WebhookEvent::Other { event_type: "checkout.session.completed".into() }
        );
        deliver(&f, &event).await.unwrap();
        assert!(f.store.list_purchases_by_session("cs_other_app").await.unwrap().is_empty());
    }

    #[test]
    fn test_extreme_timestamp_header_rejected() {
        let f = fixture();
        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            let result = f.handler.parse_event(b"{}", header);
            assert!(matches!(result, Err(PaymentError::WebhookSignature(_))));
        }
    }

    #[test]
    fn test_unknown_event_is_other() {
        let payload = br#"{"id":"evt_9","type":"invoice.paid","data":{"object":{}}}"#;
        assert_eq!(
            parse_payload(payload).unwrap(),
            WebhookEvent::Other { event_type: "invoice.paid".into() }
        );
    }
}

//! Checkout Session Initiation
//!
//! Pending rows are written before the hosted session exists so the webhook
//! and the verifier always have something to reconcile against.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_core::model::{AuthUser, Purchase, PurchaseStatus};
use storefront_core::{ShopError, Store};
use uuid::Uuid;

use crate::error::Result;
use crate::gateway::{LineItem, PaymentGateway, SessionMode, SessionRequest};
use crate::metadata::{CheckoutKind, CheckoutMetadata};

/// Where the processor sends the customer afterwards
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutUrls {
    site_url: String,
}

impl CheckoutUrls {
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{CHECKOUT_SESSION_ID}` is substituted by the processor
    pub fn success(&self) -> String {
        format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", self.site_url)
    }

    pub fn cart(&self) -> String {
        format!("{}/cart", self.site_url)
    }

    pub fn coaching(&self) -> String {
        format!("{}/coaching", self.site_url)
    }
}

/// Result of creating a checkout session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub checkout_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub purchase_ids: Vec<Uuid>,
}

/// Opens hosted checkout sessions for products, plans and consultations
pub struct CheckoutService<S: Store + ?Sized> {
    store: Arc<S>,
    gateway: Arc<dyn PaymentGateway>,
    urls: CheckoutUrls,
    test_mode: bool,
}

impl<S: Store + ?Sized> CheckoutService<S> {
    pub fn new(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        urls: CheckoutUrls,
        test_mode: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            urls,
            test_mode,
        }
    }

    /// Check out one product (`CheckoutKind::Product`) or a cart
    /// (`CheckoutKind::Cart`)
    pub async fn checkout_products(
        &self,
        user: &AuthUser,
        product_ids: &[Uuid],
        kind: CheckoutKind,
    ) -> Result<CheckoutSession> {
        if !kind.is_purchase() {
            return Err(ShopError::Validation(format!("{} is not a product checkout", kind.as_str())).into());
        }

        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = product_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        if ids.is_empty() {
            return Err(ShopError::Validation("No products to check out".into()).into());
        }

        let mut products = Vec::with_capacity(ids.len());
        for id in &ids {
            let product = self
                .store
                .get_product(*id)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| ShopError::NotFound(format!("Product {id}")))?;
            products.push(product);
        }

        // Reject before anything is written or sent to the processor
        for product in &products {
            let owned = self
                .store
                .find_purchases(user.id, product.id)
                .await?
                .iter()
                .any(Purchase::is_completed);
            if owned {
                return Err(ShopError::AlreadyPurchased(product.title.clone()).into());
            }
        }

        let mut pending: Vec<Purchase> = products
            .iter()
            .map(|p| Purchase::pending(user.id, p.id, p.price, self.test_mode))
            .collect();

        let mut metadata = CheckoutMetadata::new(kind, user.id);
        metadata.product_ids = ids;
        metadata.purchase_ids = pending.iter().map(|p| p.id).collect();
        metadata.check_limits()?;

        for (written, purchase) in pending.iter().enumerate() {
            if let Err(e) = self.store.insert_purchase(purchase).await {
                self.fail_pending(&pending[..written]).await;
                return Err(e.into());
            }
        }

        let request = SessionRequest {
            mode: SessionMode::Payment,
            line_items: products
                .iter()
                .map(|p| LineItem {
                    name: p.title.clone(),
                    description: p.description.clone(),
                    amount: p.price,
                    recurring_monthly: false,
                })
                .collect(),
            customer_email: user.email.clone(),
            client_reference_id: Some(user.id.to_string()),
            success_url: self.urls.success(),
            cancel_url: self.urls.cart(),
            metadata: metadata.to_map(),
        };

        let hosted = match self.gateway.create_session(request).await {
            Ok(hosted) => hosted,
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Checkout session creation failed");
                self.fail_pending(&pending).await;
                return Err(e);
            }
        };

        for purchase in &mut pending {
            purchase.stripe_session_id = Some(hosted.id.clone());
            purchase.updated_at = Utc::now();
            if let Err(e) = self.store.update_purchase(purchase).await {
                tracing::warn!(
                    purchase_id = %purchase.id,
                    session_id = %hosted.id,
                    error = %e,
                    "Could not attach session to pending purchase"
                );
            }
        }

        tracing::info!(
            user_id = %user.id,
            session_id = %hosted.id,
            items = pending.len(),
            checkout_type = kind.as_str(),
            "Created checkout session"
        );

        Ok(CheckoutSession {
            session_id: hosted.id,
            checkout_url: hosted.url,
            purchase_ids: pending.iter().map(|p| p.id).collect(),
        })
    }

    /// Subscribe to a coaching plan
    pub async fn checkout_subscription(&self, user: &AuthUser, plan_id: Uuid) -> Result<CheckoutSession> {
        let plan = self
            .store
            .get_plan(plan_id)
            .await?
            .filter(|p| p.active)
            .ok_or_else(|| ShopError::NotFound(format!("Plan {plan_id}")))?;

        let subscribed = self
            .store
            .list_subscriptions_for_user(user.id)
            .await?
            .iter()
            .any(|s| s.plan_id == plan.id && s.is_entitled());
        if subscribed {
            return Err(ShopError::AlreadySubscribed(plan.name.clone()).into());
        }

        let mut metadata = CheckoutMetadata::new(CheckoutKind::Subscription, user.id);
        metadata.plan_id = Some(plan.id);

        let request = SessionRequest {
            mode: SessionMode::Subscription,
            line_items: vec![LineItem {
                name: plan.name.clone(),
                description: plan.description.clone(),
                amount: plan.price,
                recurring_monthly: true,
            }],
            customer_email: user.email.clone(),
            client_reference_id: Some(user.id.to_string()),
            success_url: self.urls.success(),
            cancel_url: self.urls.coaching(),
            metadata: metadata.to_map(),
        };

        let hosted = self.gateway.create_session(request).await.inspect_err(|e| {
            tracing::error!(user_id = %user.id, plan_id = %plan.id, error = %e, "Subscription checkout failed");
        })?;

        tracing::info!(user_id = %user.id, plan_id = %plan.id, session_id = %hosted.id, "Created subscription checkout");

        Ok(CheckoutSession {
            session_id: hosted.id,
            checkout_url: hosted.url,
            purchase_ids: Vec::new(),
        })
    }

    /// Pay for a one-off consultation at `scheduled_at`
    pub async fn checkout_consultation(
        &self,
        user: &AuthUser,
        service_id: Uuid,
        scheduled_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<CheckoutSession> {
        let service = self
            .store
            .get_service(service_id)
            .await?
            .filter(|s| s.active)
            .ok_or_else(|| ShopError::NotFound(format!("Service {service_id}")))?;

        if scheduled_at <= Utc::now() {
            return Err(ShopError::Validation("Consultation must be scheduled in the future".into()).into());
        }

        let mut metadata = CheckoutMetadata::new(CheckoutKind::Consultation, user.id);
        metadata.service_id = Some(service.id);
        metadata.scheduled_at = Some(scheduled_at);
        metadata.notes = notes.filter(|n| !n.trim().is_empty());

        let request = SessionRequest {
            mode: SessionMode::Payment,
            line_items: vec![LineItem {
                name: service.name.clone(),
                description: service.description.clone(),
                amount: service.price,
                recurring_monthly: false,
            }],
            customer_email: user.email.clone(),
            client_reference_id: Some(user.id.to_string()),
            success_url: self.urls.success(),
            cancel_url: self.urls.coaching(),
            metadata: metadata.to_map(),
        };

        let hosted = self.gateway.create_session(request).await.inspect_err(|e| {
            tracing::error!(user_id = %user.id, service_id = %service.id, error = %e, "Consultation checkout failed");
        })?;

        tracing::info!(user_id = %user.id, service_id = %service.id, session_id = %hosted.id, "Created consultation checkout");

        Ok(CheckoutSession {
            session_id: hosted.id,
            checkout_url: hosted.url,
            purchase_ids: Vec::new(),
        })
    }

    async fn fail_pending(&self, pending: &[Purchase]) {
        for purchase in pending {
            let mut failed = purchase.clone();
            failed.status = PurchaseStatus::Failed;
            failed.updated_at = Utc::now();
            if let Err(e) = self.store.update_purchase(&failed).await {
                tracing::error!(purchase_id = %failed.id, error = %e, "Could not fail orphaned pending purchase");
            }
        }
    }
}

//! Stripe Gateway
//!
//! Implements [`PaymentGateway`] with Stripe Checkout (hosted). The customer is
//! redirected to Stripe and comes back to the success URL with the session id.

use async_trait::async_trait;
use stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    CreateCheckoutSessionLineItemsPriceDataRecurring,
    CreateCheckoutSessionLineItemsPriceDataRecurringInterval,
    CreateCheckoutSessionSubscriptionData, Currency, StripeError, Subscription, SubscriptionId,
};
use storefront_core::ShopError;

use crate::error::{PaymentError, Result};
use crate::gateway::{
    from_cents, from_unix, to_cents, HostedSession, LineItem, PaymentGateway, SessionMode,
    SessionRequest, SessionSnapshot, SubscriptionSnapshot,
};

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
    publishable_key: Option<String>,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
            publishable_key: None,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| PaymentError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| PaymentError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        let mut gateway = Self::new(&secret_key, &webhook_secret);
        gateway.publishable_key = std::env::var("STRIPE_PUBLISHABLE_KEY").ok();
        Ok(gateway)
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Publishable key for the browser, if configured
    pub fn publishable_key(&self) -> Option<&str> {
        self.publishable_key.as_deref()
    }
}

fn line_item(item: &LineItem) -> Result<CreateCheckoutSessionLineItems> {
    let recurring = item.recurring_monthly.then(|| CreateCheckoutSessionLineItemsPriceDataRecurring {
        interval: CreateCheckoutSessionLineItemsPriceDataRecurringInterval::Month,
        interval_count: Some(1),
    });

    Ok(CreateCheckoutSessionLineItems {
        quantity: Some(1),
        price_data: Some(CreateCheckoutSessionLineItemsPriceData {
            currency: Currency::USD,
            unit_amount: Some(to_cents(item.amount)?),
            product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                name: item.name.clone(),
                description: item.description.clone(),
                ..Default::default()
            }),
            recurring,
            ..Default::default()
        }),
        ..Default::default()
    })
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_session(&self, request: SessionRequest) -> Result<HostedSession> {
        let line_items = request
            .line_items
            .iter()
            .map(line_item)
            .collect::<Result<Vec<_>>>()?;

        let mut params = CreateCheckoutSession::new();
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.customer_email = request.customer_email.as_deref();
        params.client_reference_id = request.client_reference_id.as_deref();
        params.line_items = Some(line_items);
        params.metadata = Some(request.metadata.clone());
        params.mode = Some(match request.mode {
            SessionMode::Payment => CheckoutSessionMode::Payment,
            SessionMode::Subscription => CheckoutSessionMode::Subscription,
        });
        if request.mode == SessionMode::Subscription {
            params.subscription_data = Some(CreateCheckoutSessionSubscriptionData {
                metadata: Some(request.metadata.clone()),
                ..Default::default()
            });
        }

        let session = CheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| PaymentError::Stripe(e.to_string()))?;

        let url = session
            .url
            .ok_or_else(|| PaymentError::Stripe("No checkout URL returned".into()))?;

        Ok(HostedSession {
            id: session.id.to_string(),
            url,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let id = session_id
            .parse::<CheckoutSessionId>()
            .map_err(|_| ShopError::NotFound(format!("Checkout session {session_id}")))?;

        let session = CheckoutSession::retrieve(&self.client, &id, &["line_items"])
            .await
            .map_err(|e| lookup_error(e, format!("Checkout session {session_id}")))?;

        let line_item_amounts = session
            .line_items
            .as_ref()
            .map(|list| list.data.iter().map(|item| from_cents(item.amount_total)).collect())
            .unwrap_or_default();

        Ok(SessionSnapshot {
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
            line_item_amounts,
            subscription_id: session.subscription.as_ref().map(|s| s.id().to_string()),
        })
    }

    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionSnapshot> {
        let id = subscription_id
            .parse::<SubscriptionId>()
            .map_err(|_| ShopError::NotFound(format!("Subscription {subscription_id}")))?;

        let sub = Subscription::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| lookup_error(e, format!("Subscription {subscription_id}")))?;

        Ok(SubscriptionSnapshot {
            id: sub.id.to_string(),
            status: sub.status.to_string(),
            current_period_start: from_unix(sub.current_period_start)?,
            current_period_end: from_unix(sub.current_period_end)?,
            metadata: sub.metadata.clone(),
        })
    }

    fn name(&self) -> &str {
        "Stripe"
    }
}

/// A 404 from the processor means the id does not exist
fn lookup_error(err: StripeError, what: String) -> PaymentError {
    match &err {
        StripeError::Stripe(req) if req.http_status == 404 => ShopError::NotFound(what).into(),
        _ => PaymentError::Stripe(err.to_string()),
    }
}

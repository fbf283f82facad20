//! Payment Gateway Abstraction
//!
//! The processor is reached through [`PaymentGateway`] so checkout, webhook
//! reconciliation and verification can run against Stripe in production and
//! against [`MockGateway`](crate::MockGateway) in tests and demos.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Hosted session mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Payment,
    Subscription,
}

/// One line on the hosted checkout page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    /// Billed monthly instead of once
    pub recurring_monthly: bool,
}

/// Everything needed to open a hosted checkout session
#[derive(Clone, Debug)]
pub struct SessionRequest {
    pub mode: SessionMode,
    pub line_items: Vec<LineItem>,
    pub customer_email: Option<String>,
    pub client_reference_id: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
}

/// A session the customer can be redirected to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

/// Processor-side view of a checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub id: String,
    pub mode: SessionMode,
    pub paid: bool,
    pub metadata: HashMap<String, String>,
    /// Per-line totals, in line item order
    pub line_item_amounts: Vec<Decimal>,
    pub subscription_id: Option<String>,
}

/// Processor-side view of a subscription
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub metadata: HashMap<String, String>,
}

/// Payment processor operations used by the storefront
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session
    async fn create_session(&self, request: SessionRequest) -> Result<HostedSession>;

    /// Fetch a checkout session, including line items
    async fn retrieve_session(&self, session_id: &str) -> Result<SessionSnapshot>;

    /// Fetch a subscription
    async fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionSnapshot>;

    /// Gateway name for logging
    fn name(&self) -> &str;
}

/// Convert a dollar amount to integer cents
pub fn to_cents(amount: Decimal) -> Result<i64> {
    let cents = (amount * Decimal::ONE_HUNDRED).round();
    i64::try_from(cents)
        .map_err(|_| PaymentError::Stripe(format!("amount {amount} out of range")))
}

/// Convert integer cents to a dollar amount
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Convert a unix timestamp from the processor
pub fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| PaymentError::WebhookParse(format!("bad timestamp {secs}")))
}

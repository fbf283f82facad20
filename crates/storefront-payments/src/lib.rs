//! # storefront-payments
//!
//! Checkout, webhook reconciliation and purchase verification for the
//! storefront.
//!
//! ## Purchase lifecycle
//!
//! ```text
//! ┌──────────────┐  pending rows   ┌─────────────────┐  redirect  ┌──────────────┐
//! │   Checkout   │────────────────▶│  Stripe Hosted  │───────────▶│   Success    │
//! │   Service    │  + session      │  Checkout Page  │            │   page       │
//! └──────────────┘                 └────────┬────────┘            └──────┬───────┘
//!                                           │ webhook                    │ verify
//!                                           ▼                            ▼
//!                                  ┌─────────────────┐  bus   ┌────────────────────┐
//!                                  │ WebhookHandler  │───────▶│ PurchaseVerifier   │
//!                                  └─────────────────┘        └────────────────────┘
//! ```
//!
//! Either path may settle a purchase first; both are safe to repeat.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_payments::{CheckoutKind, CheckoutService, CheckoutUrls, StripeGateway};
//!
//! let gateway = Arc::new(StripeGateway::from_env()?);
//! let checkout = CheckoutService::new(store, gateway, CheckoutUrls::new("https://shop.example"), false);
//!
//! let session = checkout.checkout_products(&user, &[product_id], CheckoutKind::Product).await?;
//! // Redirect user to: session.checkout_url
//! ```

mod checkout;
mod error;
mod gateway;
mod metadata;
mod mock;
mod signature;
mod stripe_gateway;
mod verify;
mod webhook;

pub use checkout::{CheckoutService, CheckoutSession, CheckoutUrls};
pub use error::{PaymentError, Result};
pub use gateway::{
    HostedSession, LineItem, PaymentGateway, SessionMode, SessionRequest, SessionSnapshot,
    SubscriptionSnapshot,
};
pub use metadata::{CheckoutKind, CheckoutMetadata};
pub use mock::MockGateway;
pub use signature::{sign_payload, verify_signature, TOLERANCE_SECS};
pub use stripe_gateway::StripeGateway;
pub use verify::{CompletionBus, PurchaseVerifier};
pub use webhook::{parse_payload, WebhookEvent, WebhookHandler};

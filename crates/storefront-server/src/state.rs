//! Application State

use std::sync::Arc;

use storefront_core::{AuthProvider, Store};
use storefront_payments::{
    CheckoutService, CheckoutUrls, CompletionBus, PaymentGateway, PurchaseVerifier,
    WebhookHandler,
};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};

/// Payment services, built once around the configured gateway
pub struct Payments {
    pub checkout: CheckoutService<dyn Store>,
    pub webhooks: WebhookHandler<dyn Store>,
    pub verifier: PurchaseVerifier<dyn Store>,
    pub gateway_name: String,
}

impl Payments {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        bus: CompletionBus,
        webhook_secret: &str,
        config: &ServerConfig,
    ) -> Self {
        Self {
            checkout: CheckoutService::new(
                store.clone(),
                gateway.clone(),
                CheckoutUrls::new(config.site_url.clone()),
                config.test_mode,
            ),
            webhooks: WebhookHandler::new(store.clone(), gateway.clone(), bus.clone(), webhook_secret),
            verifier: PurchaseVerifier::new(store, gateway.clone(), bus),
            gateway_name: gateway.name().to_string(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Data store (Supabase or in-memory)
    pub store: Arc<dyn Store>,

    /// Auth provider (Supabase GoTrue or in-memory)
    pub auth: Arc<dyn AuthProvider>,

    /// Payment services (optional - None if Stripe is not configured)
    pub payments: Option<Arc<Payments>>,

    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Payment services, or 503 when payments are disabled
    pub fn payments(&self) -> ApiResult<&Payments> {
        self.payments.as_deref().ok_or(ApiError::PaymentsDisabled)
    }
}

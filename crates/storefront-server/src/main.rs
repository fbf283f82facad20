//! Storefront HTTP Server
//!
//! Axum-based server for the catalog, checkout and purchase reconciliation
//! API. Falls back to in-memory backends when Supabase or Stripe is not
//! configured.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_core::{AuthProvider, MemoryAuthProvider, MemoryStore, Store};
use storefront_payments::{CompletionBus, MockGateway, PaymentGateway, StripeGateway};
use storefront_runtime::{GoTrueAuth, PostgrestStore, SupabaseConfig};
use storefront_server::config::{parse_flag, ServerConfig};
use storefront_server::{router, AppState, Payments};

const MOCK_WEBHOOK_SECRET: &str = "whsec_mock";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env();

    // Data store & auth
    let (store, auth): (Arc<dyn Store>, Arc<dyn AuthProvider>) = match SupabaseConfig::from_env() {
        Ok(supabase) => {
            tracing::info!(url = %supabase.url, "✓ Supabase configured");
            (
                Arc::new(PostgrestStore::new(supabase.clone())),
                Arc::new(GoTrueAuth::new(supabase)),
            )
        }
        Err(e) => {
            tracing::warn!("⚠ Supabase not configured ({e}) - using in-memory store and auth");
            (Arc::new(MemoryStore::new()), Arc::new(MemoryAuthProvider::new()))
        }
    };

    // Payments
    let bus = CompletionBus::new();
    let mock = std::env::var("STRIPE_MOCK").is_ok_and(|v| parse_flag(&v));
    let payments = if mock {
        tracing::warn!("⚠ STRIPE_MOCK set - payments use the in-memory gateway");
        let secret = std::env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_else(|_| MOCK_WEBHOOK_SECRET.into());
        let gateway: Arc<dyn PaymentGateway> = Arc::new(MockGateway::new());
        Some(Payments::new(store.clone(), gateway, bus, &secret, &config))
    } else {
        match StripeGateway::from_env() {
            Ok(stripe) => {
                tracing::info!(
                    publishable_key = stripe.publishable_key().is_some(),
                    "✓ Stripe configured"
                );
                let secret = stripe.webhook_secret().to_string();
                let gateway: Arc<dyn PaymentGateway> = Arc::new(stripe);
                Some(Payments::new(store.clone(), gateway, bus, &secret, &config))
            }
            Err(e) => {
                tracing::warn!("⚠ Stripe not configured ({e}) - payments disabled");
                tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
                None
            }
        }
    };

    if config.test_mode {
        tracing::info!("TEST_MODE on - new purchases are flagged as test purchases");
    }

    // Build application state
    let state = AppState {
        store,
        auth,
        payments: payments.map(Arc::new),
        config: Arc::new(config.clone()),
    };

    let app = router(state, "static");

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 storefront server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  POST /api/auth/signup        - Create account");
    tracing::info!("  GET  /api/products           - Catalog");
    tracing::info!("  POST /api/checkout[/cart]    - Start checkout");
    tracing::info!("  POST /api/purchases/verify   - Verify returning checkout");
    tracing::info!("  GET  /api/purchases/wait     - Wait for settlement");
    tracing::info!("  POST /webhook/stripe         - Stripe events");
    tracing::info!("  *    /api/admin/...          - Admin (role = admin)");

    axum::serve(listener, app).await?;

    Ok(())
}

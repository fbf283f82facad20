//! Storefront HTTP API
//!
//! Axum router over the catalog, checkout, webhook and verification services.
//! `main.rs` wires the real backends; tests build [`AppState`] with in-memory
//! ones.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{account, admin, cart, catalog, checkout, coaching, purchases, webhook};
pub use crate::state::{AppState, Payments};

/// API routes without static file serving
pub fn api_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/services", get(admin::list_services).post(admin::create_service))
        .route("/services/{id}", put(admin::update_service).delete(admin::delete_service))
        .route("/plans", get(admin::list_plans).post(admin::create_plan))
        .route("/plans/{id}", put(admin::update_plan).delete(admin::delete_plan))
        .route("/courses", get(admin::list_courses).post(admin::create_course_handler))
        .route(
            "/courses/{id}",
            put(admin::update_course).delete(admin::delete_course_handler),
        )
        .route("/sections", post(admin::create_section))
        .route("/sections/{id}", put(admin::update_section).delete(admin::delete_section))
        .route("/lessons", post(admin::create_lesson))
        .route("/lessons/{id}", put(admin::update_lesson).delete(admin::delete_lesson))
        .route("/sessions", get(admin::list_sessions).post(admin::create_session))
        .route("/sessions/{id}", put(admin::update_session_handler))
        .route("/users", get(admin::list_users));

    Router::new()
        // Health & account
        .route("/health", get(handlers::health_check))
        .route("/api/auth/signup", post(account::signup))
        .route("/api/debug/role", get(account::debug_role))

        // Catalog
        .route("/api/products", get(catalog::list_products))
        .route("/api/products/{id}", get(catalog::get_product))
        .route("/api/courses/{id}", get(catalog::get_course))
        .route("/api/coaching/services", get(catalog::list_services))
        .route("/api/coaching/plans", get(catalog::list_plans))

        // Cart & checkout
        .route("/api/cart", get(cart::get_cart).put(cart::put_cart))
        .route("/api/checkout", post(checkout::checkout_product))
        .route("/api/checkout/cart", post(checkout::checkout_cart))
        .route("/api/checkout/subscription", post(checkout::checkout_subscription))
        .route("/api/checkout/consultation", post(checkout::checkout_consultation))

        // Purchases & subscriptions
        .route("/api/purchases", get(purchases::list_purchases))
        .route("/api/purchases/verify", post(purchases::verify_purchase))
        .route("/api/purchases/wait", get(purchases::wait_for_purchase))
        .route("/api/subscription", get(purchases::current_subscription))
        .route("/api/coaching/sessions", get(coaching::list_my_sessions).post(coaching::book))

        // Payments
        .route("/webhook/stripe", post(webhook::stripe_webhook))

        .nest("/api/admin", admin)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

/// Full application: API plus the WASM frontend from `static_dir`
pub fn router(state: AppState, static_dir: &str) -> Router {
    api_router(state).fallback_service(tower_http::services::ServeDir::new(static_dir))
}

//! End-to-end API tests over in-memory backends

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use storefront_core::model::{
    AuthUser, Product, Profile, PurchaseStatus, Role, SubscriptionStatus, UserSubscription,
};
use storefront_core::{MemoryAuthProvider, MemoryStore, PurchaseStore, SubscriptionStore};
use storefront_core::{CatalogStore, ProfileStore};
use storefront_payments::{sign_payload, CompletionBus, MockGateway};
use storefront_server::config::ServerConfig;
use storefront_server::{api_router, AppState, Payments};

const SECRET: &str = "whsec_api_test";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    auth: Arc<MemoryAuthProvider>,
    gateway: Arc<MockGateway>,
}

impl TestApp {
    fn new() -> Self {
        Self::build(true)
    }

    fn without_payments() -> Self {
        Self::build(false)
    }

    fn build(with_payments: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let auth = Arc::new(MemoryAuthProvider::new());
        let gateway = Arc::new(MockGateway::new());
        let config = ServerConfig::default();

        let payments = with_payments.then(|| {
            Arc::new(Payments::new(
                store.clone(),
                gateway.clone(),
                CompletionBus::new(),
                SECRET,
                &config,
            ))
        });

        let state = AppState {
            store: store.clone(),
            auth: auth.clone(),
            payments,
            config: Arc::new(config),
        };

        Self {
            router: api_router(state),
            store,
            auth,
            gateway,
        }
    }

    async fn user(&self, email: &str) -> (AuthUser, String) {
        let (user, token) = self.auth.register(email, "secret123").await.unwrap();
        self.store
            .insert_profile(&Profile::new(user.id, email, None))
            .await
            .unwrap();
        (user, token)
    }

    async fn admin(&self) -> (AuthUser, String) {
        let (user, token) = self.auth.register("admin@example.com", "secret123").await.unwrap();
        let mut profile = Profile::new(user.id, "admin@example.com", None);
        profile.role = Role::Admin;
        self.store.insert_profile(&profile).await.unwrap();
        (user, token)
    }

    async fn product(&self, title: &str) -> Product {
        let product = Product::new(title, dec!(25));
        self.store.insert_product(&product).await.unwrap();
        product
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn webhook(&self, event: &Value, secret: &str) -> (StatusCode, Value) {
        let payload = serde_json::to_vec(event).unwrap();
        let signature = sign_payload(&payload, secret, Utc::now().timestamp()).unwrap();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhook/stripe")
            .header("stripe-signature", signature)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        self.send(request).await
    }
}

fn completed_event(session_id: &str, metadata: &Value) -> Value {
    json!({
        "id": "evt_api_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": session_id,
            "mode": "payment",
            "payment_status": "paid",
            "metadata": metadata,
        }}
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["auth_provider"], "memory");
}

#[tokio::test]
async fn test_signup_duplicate_email_reports_provider_message() {
    let app = TestApp::new();
    let request = json!({ "email": "new@example.com", "password": "secret123" });

    let (status, body) = app.call(Method::POST, "/api/auth/signup", None, Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["access_token"].is_string());

    let (status, body) = app.call(Method::POST, "/api/auth/signup", None, Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "User already registered");
    assert_eq!(app.store.list_profiles().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_signup_rejects_bad_email() {
    let app = TestApp::new();
    let request = json!({ "email": "not-an-email", "password": "secret123" });

    let (status, body) = app.call(Method::POST, "/api/auth/signup", None, Some(request)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();
    let (_, token) = app.user("member@example.com").await;

    let (status, _) = app.call(Method::GET, "/api/admin/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call(Method::GET, "/api/admin/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (_, admin_token) = app.admin().await;
    let (status, body) = app.call(Method::GET, "/api/admin/users", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_debug_role_reports_admin() {
    let app = TestApp::new();
    let (admin, token) = app.admin().await;

    let (status, body) = app.call(Method::GET, "/api/debug/role", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], admin.id.to_string());
    assert_eq!(body["role"], "admin");
    assert_eq!(body["is_admin"], true);
}

#[tokio::test]
async fn test_admin_session_draws_on_subscription_and_floors_at_zero() {
    let app = TestApp::new();
    let (_, admin_token) = app.admin().await;
    let (member, _) = app.user("client@example.com").await;

    let now = Utc::now();
    let subscription = UserSubscription {
        id: Uuid::new_v4(),
        user_id: member.id,
        plan_id: Uuid::new_v4(),
        stripe_subscription_id: "sub_api_test".into(),
        status: SubscriptionStatus::Active,
        current_period_start: now,
        current_period_end: now + Duration::days(30),
        sessions_remaining: 2,
    };
    app.store.upsert_subscription(&subscription).await.unwrap();

    let request = json!({
        "user_id": member.id,
        "subscription_id": subscription.id,
        "title": "Strategy call",
        "scheduled_at": now + Duration::days(2),
    });

    let (status, body) = app
        .call(Method::POST, "/api/admin/sessions", Some(&admin_token), Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["duration_minutes"], 60);
    let stored = app.store.get_subscription(subscription.id).await.unwrap().unwrap();
    assert_eq!(stored.sessions_remaining, 1);

    for _ in 0..2 {
        let (status, _) = app
            .call(Method::POST, "/api/admin/sessions", Some(&admin_token), Some(request.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let stored = app.store.get_subscription(subscription.id).await.unwrap().unwrap();
    assert_eq!(stored.sessions_remaining, 0);
}

#[tokio::test]
async fn test_payments_disabled() {
    let app = TestApp::without_payments();
    let (_, token) = app.user("buyer@example.com").await;
    let product = app.product("Guide").await;

    let (status, body) = app
        .call(Method::POST, "/api/checkout", Some(&token), Some(json!({ "product_id": product.id })))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "PAYMENTS_DISABLED");
}

#[tokio::test]
async fn test_checkout_requires_login() {
    let app = TestApp::new();
    let product = app.product("Guide").await;

    let (status, _) = app
        .call(Method::POST, "/api/checkout", None, Some(json!({ "product_id": product.id })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(app.gateway.created_requests().await.is_empty());
}

#[tokio::test]
async fn test_webhook_bad_signature_changes_nothing() {
    let app = TestApp::new();
    let (_, token) = app.user("buyer@example.com").await;
    let product = app.product("Guide").await;

    let (status, session) = app
        .call(Method::POST, "/api/checkout", Some(&token), Some(json!({ "product_id": product.id })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let metadata = json!(app.gateway.created_requests().await[0].metadata);

    let (status, body) = app.webhook(&completed_event(&session_id, &metadata), "whsec_wrong").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_SIGNATURE");

    let rows = app.store.list_purchases_by_session(&session_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, PurchaseStatus::Pending);
}

#[tokio::test]
async fn test_webhook_unpaid_completion_leaves_pending() {
    let app = TestApp::new();
    let (_, token) = app.user("buyer@example.com").await;
    let product = app.product("Guide").await;

    let (_, session) = app
        .call(Method::POST, "/api/checkout", Some(&token), Some(json!({ "product_id": product.id })))
        .await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    let metadata = json!(app.gateway.created_requests().await[0].metadata);

    let mut event = completed_event(&session_id, &metadata);
    event["data"]["object"]["payment_status"] = json!("unpaid");
    let (status, _) = app.webhook(&event, SECRET).await;
    assert_eq!(status, StatusCode::OK);

    let rows = app.store.list_purchases_by_session(&session_id).await.unwrap();
    assert_eq!(rows[0].status, PurchaseStatus::Pending);
}

#[tokio::test]
async fn test_webhook_foreign_checkout_acknowledged() {
    let app = TestApp::new();
    let event = completed_event("cs_test_other_app", &json!({ "order": "42" }));

    let (status, _) = app.webhook(&event, SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.list_purchases_by_session("cs_test_other_app").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_unprocessable_event_rejected() {
    let app = TestApp::new();
    let (buyer, _) = app.user("buyer@example.com").await;
    let mut event = completed_event(
        "cs_test_sub",
        &json!({ "checkout_type": "subscription", "user_id": buyer.id.to_string() }),
    );
    event["data"]["object"]["mode"] = json!("subscription");

    let (status, body) = app.webhook(&event, SECRET).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_EVENT");
}

#[tokio::test]
async fn test_verify_unknown_session_not_found() {
    let app = TestApp::new();
    let (_, token) = app.user("buyer@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/purchases/verify",
            Some(&token),
            Some(json!({ "session_id": "cs_test_unknown" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_webhook_missing_signature() {
    let app = TestApp::new();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/webhook/stripe")
        .body(Body::from("{}"))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_SIGNATURE");
}

#[tokio::test]
async fn test_cart_checkout_webhook_then_verify() {
    let app = TestApp::new();
    let (buyer, token) = app.user("buyer@example.com").await;
    let guide = app.product("Guide").await;
    let templates = app.product("Templates").await;

    // Client-sent prices are ignored
    let cart = json!({
        "items": [
            { "id": guide.id, "title": "Guide", "price": "0.01" },
            { "id": templates.id, "title": "Templates", "price": "0.01" },
        ]
    });
    let (status, session) = app.call(Method::POST, "/api/checkout/cart", Some(&token), Some(cart)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(session["checkout_url"].is_string());
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let request = app.gateway.created_requests().await.pop().unwrap();
    assert!(request.line_items.iter().all(|item| item.amount == dec!(25)));

    app.gateway.mark_paid(&session_id).await.unwrap();
    let (status, _) = app.webhook(&completed_event(&session_id, &json!(request.metadata)), SECRET).await;
    assert_eq!(status, StatusCode::OK);

    let purchases = app.store.list_purchases_for_user(buyer.id).await.unwrap();
    assert_eq!(purchases.len(), 2);
    assert!(purchases.iter().all(|p| p.status == PurchaseStatus::Completed));

    let (status, body) = app
        .call(
            Method::POST,
            "/api/purchases/verify",
            Some(&token),
            Some(json!({ "session_id": session_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_completed");
    assert_eq!(body["settled"], true);

    let (status, body) = app.call(Method::GET, "/api/purchases", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_verify_without_token_uses_claimed_user() {
    let app = TestApp::new();
    let (buyer, token) = app.user("buyer@example.com").await;
    let product = app.product("Guide").await;

    let (_, session) = app
        .call(Method::POST, "/api/checkout", Some(&token), Some(json!({ "product_id": product.id })))
        .await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let verify = |user_id: Uuid| json!({ "session_id": session_id, "user_id": user_id });

    let (status, body) = app.call(Method::POST, "/api/purchases/verify", None, Some(verify(buyer.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending_payment");
    assert_eq!(body["settled"], false);

    let (status, _) = app
        .call(Method::POST, "/api/purchases/verify", None, Some(verify(Uuid::new_v4())))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    app.gateway.mark_paid(&session_id).await.unwrap();
    let (status, body) = app.call(Method::POST, "/api/purchases/verify", None, Some(verify(buyer.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let rows = app.store.find_purchases(buyer.id, product.id).await.unwrap();
    assert_eq!(rows[0].status, PurchaseStatus::Completed);
}

#[tokio::test]
async fn test_checkout_owned_product_conflicts() {
    let app = TestApp::new();
    let (buyer, token) = app.user("buyer@example.com").await;
    let product = app.product("Guide").await;

    let (_, session) = app
        .call(Method::POST, "/api/checkout", Some(&token), Some(json!({ "product_id": product.id })))
        .await;
    let session_id = session["session_id"].as_str().unwrap().to_string();
    app.gateway.mark_paid(&session_id).await.unwrap();
    let (status, _) = app
        .call(
            Method::POST,
            "/api/purchases/verify",
            Some(&token),
            Some(json!({ "session_id": session_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .call(Method::POST, "/api/checkout", Some(&token), Some(json!({ "product_id": product.id })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_PURCHASED");
    assert_eq!(app.store.find_purchases(buyer.id, product.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cart_put_dedupes_items() {
    let app = TestApp::new();
    let (_, token) = app.user("buyer@example.com").await;
    let product = app.product("Guide").await;

    let item = json!({ "id": product.id, "title": "Guide", "price": "25" });
    let (status, body) = app
        .call(Method::PUT, "/api/cart", Some(&token), Some(json!({ "items": [item.clone(), item] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);

    let (_, body) = app.call(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(body["items"][0]["id"], product.id.to_string());
}

#[tokio::test]
async fn test_inactive_products_hidden() {
    let app = TestApp::new();
    app.product("Visible").await;
    let mut hidden = Product::new("Hidden", dec!(5));
    hidden.active = false;
    app.store.insert_product(&hidden).await.unwrap();

    let (status, body) = app.call(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body.as_array().unwrap().iter().map(|p| p["title"].clone()).collect();
    assert_eq!(titles, vec![json!("Visible")]);
}

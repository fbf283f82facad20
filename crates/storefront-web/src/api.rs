//! API Client

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::storage;

/// Catalog product as the API returns it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Cart line, keyed by product id
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub title: String,
    pub price: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl From<&Product> for CartItem {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            title: product.title.clone(),
            price: product.price.clone(),
            image_url: product.image_url.clone(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SignUpUser {
    pub id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SignUpResponse {
    pub user: SignUpUser,
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
}

/// Server's answer to one verification attempt
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct VerifyResponse {
    pub session_id: String,
    pub status: String,
    pub settled: bool,
}

fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| "http://localhost:3000".into())
}

fn url(path: &str) -> String {
    format!("{}{}", origin(), path)
}

fn with_token(request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match storage::access_token() {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, String> {
    if response.status().is_success() {
        response.json().await.map_err(|e| e.to_string())
    } else {
        let data: serde_json::Value = response.json().await.unwrap_or_default();
        Err(data["error"].as_str().unwrap_or("Request failed").to_string())
    }
}

/// Active catalog products
pub async fn list_products() -> Result<Vec<Product>, String> {
    let response = reqwest::Client::new()
        .get(url("/api/products"))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read(response).await
}

/// Create an account; the provider's error message is passed through as-is
pub async fn sign_up(email: &str, password: &str, full_name: Option<&str>) -> Result<SignUpResponse, String> {
    let body = serde_json::json!({
        "email": email,
        "password": password,
        "full_name": full_name,
    });

    let response = reqwest::Client::new()
        .post(url("/api/auth/signup"))
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read(response).await
}

/// Start a checkout for the cart; returns the hosted checkout URL
pub async fn checkout_cart(items: &[CartItem]) -> Result<CheckoutResponse, String> {
    let body = serde_json::json!({ "items": items });

    let response = with_token(reqwest::Client::new().post(url("/api/checkout/cart")))
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read(response).await
}

/// Ask the server to reconcile a returning checkout session
pub async fn verify_purchase(session_id: &str) -> Result<VerifyResponse, String> {
    let mut body = serde_json::json!({ "session_id": session_id });
    if let Some(user_id) = storage::user_id() {
        body["user_id"] = serde_json::json!(user_id);
    }

    let response = with_token(reqwest::Client::new().post(url("/api/purchases/verify")))
        .json(&body)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read(response).await
}

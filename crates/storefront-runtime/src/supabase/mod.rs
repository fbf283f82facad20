//! Supabase Backend
//!
//! Tables are reached through PostgREST (`/rest/v1`) with the service-role
//! key; accounts through GoTrue (`/auth/v1`) with the anon key.

mod auth;
mod store;

pub use auth::GoTrueAuth;
pub use store::PostgrestStore;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use storefront_core::{Result, ShopError};

/// Supabase project configuration
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,

    /// Public key for auth endpoints
    pub anon_key: String,

    /// Privileged key for table access from the server
    pub service_role_key: String,
}

impl SupabaseConfig {
    pub fn new(
        url: impl Into<String>,
        anon_key: impl Into<String>,
        service_role_key: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            service_role_key: service_role_key.into(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| {
            std::env::var(name).map_err(|_| ShopError::Config(format!("{name} not set")))
        };
        Ok(Self::new(
            var("SUPABASE_URL")?,
            var("SUPABASE_ANON_KEY")?,
            var("SUPABASE_SERVICE_ROLE_KEY")?,
        ))
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.url)
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.url)
    }
}

/// PostgREST filter/order query string
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column = value`
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params.push((column.into(), format!("eq.{}", value.to_string())));
        self
    }

    /// Sort ascending by `column`
    pub fn order(mut self, column: &str) -> Self {
        self.params.push(("order".into(), format!("{column}.asc")));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".into(), n.to_string()));
        self
    }

    /// Upsert conflict target
    pub fn on_conflict(mut self, column: &str) -> Self {
        self.params.push(("on_conflict".into(), column.into()));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Map an HTTP failure to a storefront error
fn transport_error(err: reqwest::Error) -> ShopError {
    ShopError::Storage(err.to_string())
}

/// Send and decode a JSON body, mapping non-success statuses
async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
    let response = request.send().await.map_err(transport_error)?;
    let response = check_status(response, what).await?;
    response.json::<T>().await.map_err(transport_error)
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = %status, what, body = %body, "Supabase request failed");
    Err(match status {
        StatusCode::NOT_FOUND => ShopError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED => ShopError::Unauthorized("Invalid or expired token".into()),
        StatusCode::FORBIDDEN => ShopError::Forbidden(format!("{what}: permission denied")),
        _ => ShopError::Storage(format!("{what}: HTTP {status}")),
    })
}

fn http_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_query_building() {
        let user = Uuid::nil();
        let query = Query::new()
            .eq("user_id", user)
            .eq("status", "pending")
            .order("created_at")
            .limit(1);
        assert_eq!(
            query.params(),
            &[
                ("user_id".to_string(), format!("eq.{user}")),
                ("status".to_string(), "eq.pending".to_string()),
                ("order".to_string(), "created_at.asc".to_string()),
                ("limit".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_urls() {
        let config = SupabaseConfig::new("https://demo.supabase.co/", "anon", "service");
        assert_eq!(config.rest_url("purchases"), "https://demo.supabase.co/rest/v1/purchases");
        assert_eq!(config.auth_url("signup"), "https://demo.supabase.co/auth/v1/signup");
    }
}

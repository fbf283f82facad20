//! Auth Provider Strategy Pattern
//!
//! Sign-up and token verification are delegated to an external provider
//! (Supabase GoTrue in production). Handlers only ever see [`AuthUser`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, ShopError};
use crate::model::AuthUser;

/// Credentials and optional profile data for a new account
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

/// Result of a successful sign-up
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthSession {
    pub user: AuthUser,
    /// Present when the provider signs the user in immediately
    pub access_token: Option<String>,
}

/// Common interface for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Register a new account. Provider rejections come back as
    /// [`ShopError::Auth`] carrying the provider's message unchanged.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthSession>;

    /// Resolve a bearer access token to its user
    async fn user_from_token(&self, token: &str) -> Result<AuthUser>;

    /// Provider name (for logging)
    fn name(&self) -> &str;
}

/// In-memory auth provider (for development and tests)
#[derive(Default)]
pub struct MemoryAuthProvider {
    accounts: RwLock<HashMap<String, AuthUser>>,
    tokens: RwLock<HashMap<String, AuthUser>>,
}

impl MemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue an access token for an existing user id
    pub async fn issue_token(&self, user: &AuthUser) -> String {
        let token = format!("mem_{}", Uuid::new_v4().simple());
        self.tokens.write().await.insert(token.clone(), user.clone());
        token
    }

    /// Register an account directly and return its token
    pub async fn register(&self, email: &str, password: &str) -> Result<(AuthUser, String)> {
        let session = self
            .sign_up(&SignUpRequest {
                email: email.into(),
                password: password.into(),
                full_name: None,
            })
            .await?;
        let token = session
            .access_token
            .ok_or_else(|| ShopError::Auth("no session issued".into()))?;
        Ok((session.user, token))
    }
}

#[async_trait]
impl AuthProvider for MemoryAuthProvider {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthSession> {
        if request.password.len() < 6 {
            return Err(ShopError::Auth(
                "Password should be at least 6 characters".into(),
            ));
        }

        let email = request.email.trim().to_lowercase();
        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&email) {
                return Err(ShopError::Auth("User already registered".into()));
            }
            let user = AuthUser {
                id: Uuid::new_v4(),
                email: Some(email.clone()),
            };
            accounts.insert(email, user.clone());
            user
        };

        let token = self.issue_token(&user).await;
        Ok(AuthSession {
            user,
            access_token: Some(token),
        })
    }

    async fn user_from_token(&self, token: &str) -> Result<AuthUser> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| ShopError::Unauthorized("Invalid or expired token".into()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

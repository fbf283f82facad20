//! GoTrue auth provider

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use storefront_core::model::AuthUser;
use storefront_core::{AuthProvider, AuthSession, Result, ShopError, SignUpRequest};
use uuid::Uuid;

use super::{http_client, send_json, transport_error, SupabaseConfig};

#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

impl From<GoTrueUser> for AuthUser {
    fn from(user: GoTrueUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email,
        }
    }
}

/// Sign-up answers with a session when email confirmation is off, and with
/// the bare user otherwise
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session {
        access_token: String,
        user: GoTrueUser,
    },
    User(GoTrueUser),
}

/// Error body; older and newer GoTrue versions use different keys
#[derive(Deserialize, Default)]
struct GoTrueError {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GoTrueError {
    fn into_message(self) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| "Sign up failed".into())
    }
}

/// Supabase Auth (GoTrue) provider
pub struct GoTrueAuth {
    client: Client,
    config: SupabaseConfig,
}

impl GoTrueAuth {
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            client: http_client(),
            config,
        }
    }
}

#[async_trait]
impl AuthProvider for GoTrueAuth {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<AuthSession> {
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": { "full_name": request.full_name },
        });

        let response = self
            .client
            .post(self.config.auth_url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_client_error() {
            // Provider wording goes back to the caller untouched
            let err: GoTrueError = response.json().await.unwrap_or_default();
            let message = err.into_message();
            tracing::info!(status = %status, message = %message, "Sign up rejected");
            return Err(ShopError::Auth(message));
        }
        if !status.is_success() {
            tracing::error!(status = %status, "Sign up failed upstream");
            return Err(ShopError::Storage(format!("auth signup: HTTP {status}")));
        }

        let parsed: SignUpResponse = response.json().await.map_err(transport_error)?;
        Ok(match parsed {
            SignUpResponse::Session { access_token, user } => AuthSession {
                user: user.into(),
                access_token: Some(access_token),
            },
            SignUpResponse::User(user) => AuthSession {
                user: user.into(),
                access_token: None,
            },
        })
    }

    async fn user_from_token(&self, token: &str) -> Result<AuthUser> {
        let request = self
            .client
            .get(self.config.auth_url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(token);
        let user: GoTrueUser = send_json(request, "auth user").await?;
        Ok(user.into())
    }

    fn name(&self) -> &str {
        "supabase"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signup_response_shapes() {
        let id = Uuid::new_v4();
        let session: SignUpResponse = serde_json::from_value(json!({
            "access_token": "jwt",
            "token_type": "bearer",
            "user": { "id": id, "email": "a@b.c" }
        }))
        .unwrap();
        assert!(matches!(session, SignUpResponse::Session { ref access_token, .. } if access_token == "jwt"));

        let user: SignUpResponse =
            serde_json::from_value(json!({ "id": id, "email": "a@b.c", "aud": "authenticated" }))
                .unwrap();
        assert!(matches!(user, SignUpResponse::User(GoTrueUser { id: uid, .. }) if uid == id));
    }

    #[test]
    fn test_error_message_is_verbatim() {
        let err: GoTrueError = serde_json::from_value(json!({
            "code": 422,
            "error_code": "user_already_exists",
            "msg": "User already registered"
        }))
        .unwrap();
        assert_eq!(err.into_message(), "User already registered");

        let legacy: GoTrueError = serde_json::from_value(json!({
            "error": "invalid_grant",
            "error_description": "Password should be at least 6 characters"
        }))
        .unwrap();
        assert_eq!(legacy.into_message(), "Password should be at least 6 characters");
    }
}

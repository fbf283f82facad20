//! Error Types

use thiserror::Error;

/// Result type alias for storefront operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Storefront error types
#[derive(Error, Debug)]
pub enum ShopError {
    /// Record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request failed validation (missing or malformed fields)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller is not authenticated
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but lacks permission
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// User already owns the product
    #[error("Already purchased: {0}")]
    AlreadyPurchased(String),

    /// User already holds an active subscription to the plan
    #[error("Already subscribed: {0}")]
    AlreadySubscribed(String),

    /// Auth provider rejected the request (message is the provider's own)
    #[error("{0}")]
    Auth(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl ShopError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ShopError::Storage(_))
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            ShopError::NotFound(what) => format!("{what} not found."),
            ShopError::Validation(msg) => msg.clone(),
            ShopError::Unauthorized(_) => "Please sign in to continue.".into(),
            ShopError::Forbidden(msg) => msg.clone(),
            ShopError::AlreadyPurchased(_) => "You already own this product.".into(),
            ShopError::AlreadySubscribed(_) => "You already have an active subscription to this plan.".into(),
            ShopError::Auth(msg) => msg.clone(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for ShopError {
    fn from(err: anyhow::Error) -> Self {
        ShopError::Other(err.to_string())
    }
}

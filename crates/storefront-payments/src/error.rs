//! Payment Error Types

use storefront_core::ShopError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload or session metadata could not be decoded
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain or storage error
    #[error(transparent)]
    Shop(#[from] ShopError),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Stripe(_) => true,
            PaymentError::Shop(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Stripe(_) => "Payment processing failed. Please try again.".into(),
            PaymentError::WebhookSignature(_) => "Invalid signature.".into(),
            PaymentError::WebhookParse(_) => "Malformed payment event.".into(),
            PaymentError::Config(_) => "Service configuration error.".into(),
            PaymentError::Shop(e) => e.user_message(),
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::WebhookParse(err.to_string())
    }
}

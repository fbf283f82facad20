//! API Error Responses
//!
//! Every failure leaves the server as `{ "error": ..., "code": ... }` with a
//! status derived from the domain error. Upstream detail is logged, never
//! returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use storefront_core::ShopError;
use storefront_payments::PaymentError;
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Shop(#[from] ShopError),

    #[error(transparent)]
    Payment(PaymentError),

    /// Stripe keys are not configured
    #[error("Payments not configured")]
    PaymentsDisabled,

    #[error("Missing Stripe signature")]
    MissingSignature,

    /// Webhook event that can never be processed as sent
    #[error("Webhook event rejected: {0}")]
    RejectedEvent(String),
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Shop(e) => ApiError::Shop(e),
            other => ApiError::Payment(other),
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Shop(e) => match e {
                ShopError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                ShopError::Validation(_) | ShopError::Json(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                ShopError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                ShopError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                ShopError::AlreadyPurchased(_) => (StatusCode::CONFLICT, "ALREADY_PURCHASED"),
                ShopError::AlreadySubscribed(_) => (StatusCode::CONFLICT, "ALREADY_SUBSCRIBED"),
                ShopError::Auth(_) => (StatusCode::BAD_REQUEST, "AUTH_ERROR"),
                ShopError::Config(_) | ShopError::Storage(_) | ShopError::Other(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
            ApiError::Payment(e) => match e {
                PaymentError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
                PaymentError::WebhookParse(_) => (StatusCode::BAD_REQUEST, "INVALID_EVENT"),
                PaymentError::Config(_) => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
                PaymentError::Stripe(_) | PaymentError::Shop(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PAYMENT_ERROR")
                }
            },
            ApiError::PaymentsDisabled => (StatusCode::SERVICE_UNAVAILABLE, "PAYMENTS_DISABLED"),
            ApiError::MissingSignature => (StatusCode::BAD_REQUEST, "MISSING_SIGNATURE"),
            ApiError::RejectedEvent(_) => (StatusCode::BAD_REQUEST, "INVALID_EVENT"),
        }
    }

    fn user_message(&self) -> String {
        match self {
            ApiError::Shop(e) => e.user_message(),
            ApiError::Payment(e) => e.user_message(),
            ApiError::RejectedEvent(_) => "Malformed payment event.".into(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "Request failed");
        } else {
            tracing::debug!(error = %self, code, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.user_message(),
            code: code.into(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(ShopError::NotFound("Product".into())), StatusCode::NOT_FOUND),
            (ApiError::from(ShopError::AlreadyPurchased("Guide".into())), StatusCode::CONFLICT),
            (ApiError::from(ShopError::Forbidden("no".into())), StatusCode::FORBIDDEN),
            (ApiError::from(PaymentError::WebhookSignature("bad".into())), StatusCode::BAD_REQUEST),
            (ApiError::from(PaymentError::Stripe("down".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (ApiError::PaymentsDisabled, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_and_code().0, status);
        }
    }

    #[test]
    fn test_provider_message_passes_through() {
        let err = ApiError::from(ShopError::Auth("User already registered".into()));
        assert_eq!(err.user_message(), "User already registered");
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "AUTH_ERROR"));
    }

    #[test]
    fn test_upstream_detail_hidden() {
        let err = ApiError::from(ShopError::Storage("connection refused to 10.0.0.3".into()));
        assert!(!err.user_message().contains("10.0.0.3"));
    }
}

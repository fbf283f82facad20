//! Stripe webhook endpoint

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use storefront_payments::PaymentError;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let payments = state.payments()?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingSignature)?;

    let event = payments.webhooks.parse_event(&body, signature).map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        e
    })?;

    payments.webhooks.handle(event).await.map_err(processing_error)?;

    Ok(StatusCode::OK)
}

/// Retryable failures stay 5xx so the processor redelivers the event
fn processing_error(err: PaymentError) -> ApiError {
    if err.is_retryable() {
        tracing::error!(error = %err, "Webhook processing error");
        ApiError::from(err)
    } else {
        tracing::warn!(error = %err, "Webhook event rejected");
        ApiError::RejectedEvent(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use storefront_core::ShopError;

    #[test]
    fn test_transient_failures_are_retried() {
        let storage = processing_error(ShopError::Storage("timeout".into()).into());
        assert_eq!(storage.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);

        let stripe = processing_error(PaymentError::Stripe("rate limited".into()));
        assert_eq!(stripe.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_permanent_failures_are_rejected() {
        let missing = processing_error(ShopError::NotFound("Product".into()).into());
        assert!(matches!(missing, ApiError::RejectedEvent(_)));
        assert_eq!(missing.into_response().status(), StatusCode::BAD_REQUEST);
    }
}

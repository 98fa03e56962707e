use crate::domain::error::PaymentError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Newtype so the domain error can cross into axum. The status code split
/// is the retry contract: 4xx means "do not retry this delivery", 5xx
/// means "retry later". Messages are sanitized; no provider error text
/// passes through verbatim.
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self.0 {
            PaymentError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                msg.clone(),
            ),
            PaymentError::DuplicateOrderId(order_id) => (
                StatusCode::CONFLICT,
                "duplicate_order_id",
                format!("order {order_id} already has a payment"),
            ),
            PaymentError::NotFound(id) => {
                (StatusCode::NOT_FOUND, "not_found", format!("{id} not found"))
            }
            PaymentError::VersionConflict { payment_id, .. } => (
                StatusCode::CONFLICT,
                "conflict",
                format!("payment {payment_id} is being updated concurrently"),
            ),
            PaymentError::IllegalTransition { from, to } => (
                StatusCode::CONFLICT,
                "illegal_transition",
                format!("cannot move payment from {from} to {to}"),
            ),
            PaymentError::SignatureInvalid(_) => {
                // Logged as a potential security event; the caller only
                // learns that verification failed.
                tracing::warn!(error = %self.0, "webhook signature rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "signature_invalid",
                    "webhook signature verification failed".to_string(),
                )
            }
            PaymentError::StaleWebhook { skew_secs } => {
                tracing::warn!(skew_secs, "stale webhook rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "stale_webhook",
                    "webhook timestamp outside the replay window".to_string(),
                )
            }
            PaymentError::AmountMismatch { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "amount_mismatch",
                "reported amount does not match the payment".to_string(),
            ),
            PaymentError::RefundExceedsAmount {
                requested,
                remaining,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "refund_exceeds_amount",
                format!("requested {requested} but only {remaining} is refundable"),
            ),
            PaymentError::ProviderUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "provider_unavailable",
                "payment provider is unavailable, retry later".to_string(),
            ),
            PaymentError::ProviderRejected(_) => (
                StatusCode::BAD_GATEWAY,
                "provider_rejected",
                "payment provider rejected the request".to_string(),
            ),
            PaymentError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            PaymentError::Serialization(err) => (
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                format!("malformed payload: {err}"),
            ),
        };

        let body = serde_json::json!({
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

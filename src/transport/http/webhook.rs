use {
    super::errors::ApiError,
    crate::AppState,
    crate::domain::error::PaymentError,
    crate::domain::payment::ProviderKind,
    crate::domain::webhook::WebhookOutcome,
    axum::{
        Json,
        extract::{Path, State},
        http::HeaderMap,
    },
};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

fn required_header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, PaymentError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::SignatureInvalid(format!("missing {name} header")))
}

/// Provider callback endpoint. 200 covers both a committed transition and
/// an idempotent replay, so providers stop retrying; authentication and
/// consistency failures map to do-not-retry 4xx codes in `ApiError`.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(provider = %provider, outcome = tracing::field::Empty)
)]
pub async fn provider_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let provider = ProviderKind::try_from(provider.to_uppercase().as_str())?;
    let signature = required_header(&headers, SIGNATURE_HEADER)?;
    let timestamp = required_header(&headers, TIMESTAMP_HEADER)?;

    let outcome = state
        .engine
        .apply_webhook(provider, &body, signature, timestamp)
        .await?;

    let (label, payment) = match &outcome {
        WebhookOutcome::Applied(p) => ("applied", p),
        WebhookOutcome::AlreadyApplied(p) => ("already_applied", p),
    };
    tracing::Span::current().record("outcome", label);
    tracing::info!(
        payment_id = %payment.payment_id(),
        status = %payment.status(),
        version = payment.version(),
        "webhook processed"
    );

    Ok(Json(serde_json::json!({
        "status": label,
        "paymentId": payment.payment_id().as_str(),
        "paymentStatus": payment.status().as_str(),
    })))
}

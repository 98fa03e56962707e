pub mod errors;
pub mod payments;
pub mod stats;
pub mod webhook;

use {
    crate::AppState,
    axum::{
        Router,
        routing::{get, post},
    },
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/payments",
            post(payments::create_payment).get(payments::list_payments),
        )
        .route("/api/payments/statistics", get(stats::payment_statistics))
        .route(
            "/api/payments/statistics/branch/{branch_id}",
            get(stats::branch_statistics),
        )
        .route(
            "/api/payments/statistics/monthly",
            get(stats::monthly_statistics),
        )
        .route("/api/payments/sweep-expired", post(payments::sweep_expired))
        .route("/api/payments/{payment_id}", get(payments::get_payment))
        .route(
            "/api/payments/{payment_id}/cancel",
            post(payments::cancel_payment),
        )
        .route(
            "/api/payments/{payment_id}/refund",
            post(payments::refund_payment),
        )
        .route(
            "/api/payments/{payment_id}/verify",
            post(payments::verify_payment),
        )
        .route("/webhooks/{provider}", post(webhook::provider_webhook))
        .with_state(state)
}

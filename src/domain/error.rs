use thiserror::Error;

use super::payment::PaymentStatus;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("duplicate order id: {0}")]
    DuplicateOrderId(String),

    #[error("payment not found: {0}")]
    NotFound(String),

    #[error("version conflict on payment {payment_id} (expected version {expected})")]
    VersionConflict { payment_id: String, expected: i64 },

    #[error("illegal transition: {from} → {to}")]
    IllegalTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("webhook signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("webhook timestamp outside replay window (skew {skew_secs}s)")]
    StaleWebhook { skew_secs: i64 },

    #[error("amount mismatch: stored {stored}, reported {reported}")]
    AmountMismatch { stored: i64, reported: i64 },

    #[error("refund of {requested} exceeds remaining balance {remaining}")]
    RefundExceedsAmount { requested: i64, remaining: i64 },

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("provider rejected the request: {0}")]
    ProviderRejected(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaymentError {
    /// Whether the caller may retry the same request and expect it to
    /// eventually succeed. Signature, amount, and transition failures are
    /// terminal; infrastructure and provider-availability failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::Database(_) | Self::VersionConflict { .. }
        )
    }
}

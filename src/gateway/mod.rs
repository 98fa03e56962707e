pub mod bank_transfer;
pub mod card;
pub mod http;
pub mod mobile;
pub mod signature;
pub mod virtual_account;

use {
    crate::domain::error::PaymentError,
    crate::domain::money::MoneyAmount,
    crate::domain::payment::{Payment, PaymentMethod, ProviderKind},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::Serialize,
    std::collections::HashMap,
    std::sync::Arc,
};

/// Per-provider credentials and endpoints, loaded at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub secret_key: String,
    pub webhook_secret: String,
}

/// Redirect/return URLs the caller UI supplies at creation time and the
/// provider needs to finish its flow.
#[derive(Debug, Clone, Default)]
pub struct ReturnUrls {
    pub success_url: Option<String>,
    pub fail_url: Option<String>,
    pub cancel_url: Option<String>,
}

/// What the caller UI needs to continue the provider-side flow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderHandle {
    /// Browser checkout page (card, bank transfer, mobile easy-pay).
    Redirect { checkout_url: String },
    /// Issued virtual account awaiting an inbound deposit.
    VirtualAccount {
        bank_code: String,
        account_number: String,
        due_at: DateTime<Utc>,
    },
    /// Nothing to hand back (cash, or providers without a synchronous
    /// handle).
    None,
}

/// Result of `initiate`: the UI handle plus the provider's transaction key
/// when it is assigned synchronously.
#[derive(Debug, Clone)]
pub struct InitiateOutcome {
    pub handle: ProviderHandle,
    pub external_payment_key: Option<String>,
}

/// One configured provider integration. Implementations are stateless per
/// call apart from immutable credentials, so a single instance serves all
/// concurrent requests.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    fn provider(&self) -> ProviderKind;

    fn method(&self) -> PaymentMethod;

    fn webhook_secret(&self) -> &str;

    /// Authenticity check for an inbound webhook: HMAC over the raw body
    /// plus a replay window on the timestamp. Runs before the payload is
    /// parsed or any payment is touched.
    fn verify_webhook(
        &self,
        raw_body: &str,
        sig_header: &str,
        ts_header: &str,
        now: DateTime<Utc>,
    ) -> Result<(), PaymentError> {
        signature::verify(self.webhook_secret(), raw_body, sig_header, ts_header, now)
    }

    /// Begin the provider-side flow for a PENDING payment. Must not mutate
    /// local state; the engine records any returned key itself.
    async fn initiate(
        &self,
        payment: &Payment,
        urls: &ReturnUrls,
    ) -> Result<InitiateOutcome, PaymentError>;

    /// Void an approved transaction at the provider. A timeout means
    /// unknown outcome and must surface as `ProviderUnavailable`, never as
    /// success.
    async fn cancel(&self, payment: &Payment, reason: Option<&str>) -> Result<(), PaymentError>;

    /// Refund `amount` of an approved transaction at the provider. Same
    /// unknown-outcome rule as `cancel`.
    async fn refund(
        &self,
        payment: &Payment,
        amount: MoneyAmount,
        reason: Option<&str>,
    ) -> Result<(), PaymentError>;
}

/// Cancel/refund address the provider's transaction, so the key it handed
/// back at initiation (or in the approval webhook) must be present.
pub(crate) fn external_key(payment: &Payment) -> Result<&str, PaymentError> {
    payment.external_payment_key().ok_or_else(|| {
        PaymentError::Validation(format!(
            "payment {} has no provider transaction key",
            payment.payment_id()
        ))
    })
}

/// Lookup table from the payment's `provider` field to the configured
/// adapter instance.
#[derive(Default)]
pub struct GatewayRegistry {
    gateways: HashMap<ProviderKind, Arc<dyn ProviderGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: Arc<dyn ProviderGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn for_provider(
        &self,
        provider: ProviderKind,
    ) -> Result<&Arc<dyn ProviderGateway>, PaymentError> {
        self.gateways.get(&provider).ok_or_else(|| {
            PaymentError::ProviderUnavailable(format!("no gateway configured for {provider}"))
        })
    }
}

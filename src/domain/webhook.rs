use {
    super::error::PaymentError,
    super::id::{OrderId, PaymentId},
    super::money::{Currency, Money, MoneyAmount},
    super::payment::{Payment, PaymentMethod, PaymentStatus, ProviderKind},
    chrono::{DateTime, Utc},
    serde::Deserialize,
};

/// Raw webhook body as providers post it. Field names follow the generic
/// provider contract; either `payment_id` or `order_id` must be present.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    pub status: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    pub method: String,
    pub provider: String,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub external_payment_key: Option<String>,
}

/// Status a provider can report. Deliberately narrower than
/// `PaymentStatus`: providers never report our local-only states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookStatus {
    Approved,
    Failed,
    Cancelled,
}

impl WebhookStatus {
    /// The local status this event drives the payment toward.
    pub fn target(&self) -> PaymentStatus {
        match self {
            Self::Approved => PaymentStatus::Approved,
            Self::Failed => PaymentStatus::Failed,
            Self::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

impl TryFrom<&str> for WebhookStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "APPROVED" => Ok(Self::Approved),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(PaymentError::Validation(format!(
                "unknown webhook status: {other}"
            ))),
        }
    }
}

/// How the engine looks the payment up: providers echo back whichever key
/// they were given at initiation.
#[derive(Debug, Clone)]
pub enum PaymentKey {
    Payment(PaymentId),
    Order(OrderId),
}

/// Validated webhook event, ready for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct WebhookEvent {
    pub key: PaymentKey,
    pub status: WebhookStatus,
    pub amount: Money,
    pub method: PaymentMethod,
    pub provider: ProviderKind,
    pub approved_at: Option<DateTime<Utc>>,
    pub external_payment_key: Option<String>,
}

impl WebhookPayload {
    pub fn into_event(self) -> Result<WebhookEvent, PaymentError> {
        let key = match (&self.payment_id, &self.order_id) {
            (Some(pid), _) => PaymentKey::Payment(PaymentId::parse(pid.clone())?),
            (None, Some(oid)) => PaymentKey::Order(OrderId::new(oid.clone())?),
            (None, None) => {
                return Err(PaymentError::Validation(
                    "webhook carries neither paymentId nor orderId".into(),
                ));
            }
        };

        let currency = match self.currency.as_deref() {
            Some(c) => Currency::try_from(c)?,
            None => Currency::Krw,
        };

        Ok(WebhookEvent {
            key,
            status: WebhookStatus::try_from(self.status.as_str())?,
            amount: Money::new(MoneyAmount::new(self.amount)?, currency),
            method: PaymentMethod::try_from(self.method.as_str())?,
            provider: ProviderKind::try_from(self.provider.as_str())?,
            approved_at: self.approved_at,
            external_payment_key: self.external_payment_key,
        })
    }
}

/// What applying a webhook (or an admin action routed through the same
/// engine) did to the payment.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// Transition committed; version advanced by one.
    Applied(Payment),
    /// Payment already in the implied state (duplicate delivery); version
    /// untouched.
    AlreadyApplied(Payment),
}

impl WebhookOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Applied(p) | Self::AlreadyApplied(p) => p,
        }
    }
}

use {
    crate::domain::payment::{Payment, PaymentStatus},
    async_trait::async_trait,
    std::sync::Arc,
    thiserror::Error,
};

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEvent {
    PaymentApproved,
    PaymentCancelled,
    PaymentRefunded,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentApproved => "payment_approved",
            Self::PaymentCancelled => "payment_cancelled",
            Self::PaymentRefunded => "payment_refunded",
        }
    }

    fn for_status(status: PaymentStatus) -> Option<Self> {
        match status {
            PaymentStatus::Approved => Some(Self::PaymentApproved),
            PaymentStatus::Cancelled => Some(Self::PaymentCancelled),
            PaymentStatus::Refunded => Some(Self::PaymentRefunded),
            _ => None,
        }
    }
}

/// External notification collaborator (SMS/KakaoTalk/email live behind
/// it). Delivery is best-effort; payment state never depends on it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        user_id: i64,
        event: NotificationEvent,
        params: serde_json::Value,
    ) -> Result<(), NotifyError>;
}

/// Default collaborator: just logs. Useful for tests and deployments
/// without a messaging backend wired up.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(
        &self,
        user_id: i64,
        event: NotificationEvent,
        params: serde_json::Value,
    ) -> Result<(), NotifyError> {
        tracing::info!(user_id, event = event.as_str(), %params, "notification");
        Ok(())
    }
}

/// Fire-and-forget hook on transitions into APPROVED / CANCELLED /
/// REFUNDED. Spawned off the request path; failures are logged, never
/// propagated into the payment flow.
pub fn notify_transition(notifier: Arc<dyn Notifier>, payment: &Payment) {
    let Some(event) = NotificationEvent::for_status(payment.status()) else {
        return;
    };

    let payer_id = payment.payer_id();
    let params = serde_json::json!({
        "payment_id": payment.payment_id().as_str(),
        "order_id": payment.order_id().as_str(),
        "amount": payment.amount().amount().minor(),
        "currency": payment.amount().currency().as_str(),
        "status": payment.status().as_str(),
    });

    tokio::spawn(async move {
        if let Err(e) = notifier.send(payer_id, event, params).await {
            tracing::warn!(user_id = payer_id, event = event.as_str(), error = %e, "notification failed");
        }
    });
}

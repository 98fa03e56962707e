pub mod memory;
pub mod postgres;

use {
    crate::domain::error::PaymentError,
    crate::domain::id::{OrderId, PaymentId},
    crate::domain::payment::{Payment, PaymentMethod, PaymentStatus, ProviderKind, StatusChange},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

/// Read-side filter for listings and statistics. All fields conjunctive;
/// `Default` matches everything.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub method: Option<PaymentMethod>,
    pub provider: Option<ProviderKind>,
    pub payer_id: Option<i64>,
    pub branch_id: Option<i64>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl PaymentFilter {
    pub fn matches(&self, p: &Payment) -> bool {
        self.status.is_none_or(|s| p.status() == s)
            && self.method.is_none_or(|m| p.method() == m)
            && self.provider.is_none_or(|pr| p.provider() == pr)
            && self.payer_id.is_none_or(|id| p.payer_id() == id)
            && self.branch_id.is_none_or(|id| p.branch_id() == id)
            && self.created_from.is_none_or(|t| p.created_at() >= t)
            && self.created_to.is_none_or(|t| p.created_at() < t)
    }
}

/// Durable record of payments. The version-guarded CAS is the single point
/// of mutual exclusion in the system: no caller holds a row lock across an
/// outbound provider call.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert a new PENDING payment. `ErrDuplicateOrderId` when the order
    /// key already exists.
    async fn create(&self, payment: Payment) -> Result<Payment, PaymentError>;

    async fn get_by_payment_id(&self, id: &PaymentId) -> Result<Payment, PaymentError>;

    async fn get_by_order_id(&self, order_id: &OrderId) -> Result<Payment, PaymentError>;

    /// Apply `change` iff the stored version equals `expected_version`,
    /// incrementing the version in the same atomic step. Returns the
    /// updated payment, or `ErrVersionConflict` when another writer won.
    async fn compare_and_swap_status(
        &self,
        id: &PaymentId,
        expected_version: i64,
        change: StatusChange,
    ) -> Result<Payment, PaymentError>;

    /// Read-side listing; only needs eventual visibility of committed
    /// writes.
    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, PaymentError>;

    /// Sweep candidates: PENDING payments whose expiry has passed, oldest
    /// first.
    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError>;
}

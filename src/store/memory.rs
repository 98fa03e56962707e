use {
    super::{PaymentFilter, PaymentStore},
    crate::domain::error::PaymentError,
    crate::domain::id::{OrderId, PaymentId},
    crate::domain::payment::{Payment, StatusChange},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    std::collections::HashMap,
    tokio::sync::RwLock,
};

#[derive(Default)]
struct Inner {
    by_payment_id: HashMap<String, Payment>,
    // order_id → payment_id
    order_index: HashMap<String, String>,
}

/// Process-local store. Backs the test suite and single-instance
/// deployments; the CAS contract is identical to the Postgres store, the
/// write lock only spans the in-memory swap, never a provider call.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn create(&self, payment: Payment) -> Result<Payment, PaymentError> {
        let mut inner = self.inner.write().await;
        let order_key = payment.order_id().as_str().to_string();
        if inner.order_index.contains_key(&order_key) {
            return Err(PaymentError::DuplicateOrderId(order_key));
        }
        let payment_key = payment.payment_id().as_str().to_string();
        inner.order_index.insert(order_key, payment_key.clone());
        inner.by_payment_id.insert(payment_key, payment.clone());
        Ok(payment)
    }

    async fn get_by_payment_id(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        self.inner
            .read()
            .await
            .by_payment_id
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(id.as_str().to_string()))
    }

    async fn get_by_order_id(&self, order_id: &OrderId) -> Result<Payment, PaymentError> {
        let inner = self.inner.read().await;
        inner
            .order_index
            .get(order_id.as_str())
            .and_then(|pid| inner.by_payment_id.get(pid))
            .cloned()
            .ok_or_else(|| PaymentError::NotFound(order_id.as_str().to_string()))
    }

    async fn compare_and_swap_status(
        &self,
        id: &PaymentId,
        expected_version: i64,
        change: StatusChange,
    ) -> Result<Payment, PaymentError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .by_payment_id
            .get(id.as_str())
            .ok_or_else(|| PaymentError::NotFound(id.as_str().to_string()))?;

        if current.version() != expected_version {
            return Err(PaymentError::VersionConflict {
                payment_id: id.as_str().to_string(),
                expected: expected_version,
            });
        }

        let next = current.apply(&change);
        inner
            .by_payment_id
            .insert(id.as_str().to_string(), next.clone());
        Ok(next)
    }

    async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        let mut out: Vec<Payment> = inner
            .by_payment_id
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.created_at());
        Ok(out)
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Payment>, PaymentError> {
        let inner = self.inner.read().await;
        let mut out: Vec<Payment> = inner
            .by_payment_id
            .values()
            .filter(|p| p.is_expired(now))
            .cloned()
            .collect();
        out.sort_by_key(|p| p.expires_at());
        out.truncate(limit);
        Ok(out)
    }
}

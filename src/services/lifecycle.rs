use {
    super::notify::{Notifier, notify_transition},
    crate::domain::error::PaymentError,
    crate::domain::id::{OrderId, PaymentId},
    crate::domain::money::{Money, MoneyAmount},
    crate::domain::payment::{
        NewPayment, Payment, PaymentMethod, PaymentStatus, ProviderKind, StatusChange,
    },
    crate::domain::webhook::{PaymentKey, WebhookOutcome, WebhookPayload, WebhookStatus},
    crate::gateway::{GatewayRegistry, ProviderHandle, ReturnUrls},
    crate::store::{PaymentFilter, PaymentStore},
    chrono::{DateTime, Duration, Utc},
    std::sync::Arc,
};

/// Bounded CAS retries before a conflict is surfaced for manual
/// reconciliation instead of looping forever.
pub const MAX_TRANSITION_RETRIES: usize = 3;

const MIN_AMOUNT_MINOR: i64 = 100;
const MAX_AMOUNT_MINOR: i64 = 100_000_000;
const DEFAULT_TIMEOUT_MINUTES: i64 = 30;
const SWEEP_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct CreateRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub provider: ProviderKind,
    pub payer_id: i64,
    pub recipient_id: i64,
    pub branch_id: i64,
    pub timeout_minutes: Option<i64>,
    pub urls: ReturnUrls,
}

#[derive(Debug)]
pub struct CreateOutcome {
    pub payment: Payment,
    pub handle: ProviderHandle,
    /// False when the order id resolved to an existing payment (retried
    /// creation request).
    pub created: bool,
}

enum Decision {
    AlreadyApplied,
    Apply(StatusChange),
}

/// The state machine owner. Every mutation (caller request, provider
/// webhook, sweeper expiry) funnels through the version-guarded CAS on
/// the store; no path holds a lock across an outbound provider call.
pub struct LifecycleEngine {
    store: Arc<dyn PaymentStore>,
    gateways: Arc<GatewayRegistry>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateways: Arc<GatewayRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            gateways,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn PaymentStore> {
        &self.store
    }

    // ── create ─────────────────────────────────────────────────────────

    /// Create a PENDING payment and start the provider flow. Idempotent on
    /// the order id: a retried request returns the existing record instead
    /// of a second row.
    pub async fn create(&self, req: CreateRequest) -> Result<CreateOutcome, PaymentError> {
        let minor = req.amount.amount().minor();
        if !(MIN_AMOUNT_MINOR..=MAX_AMOUNT_MINOR).contains(&minor) {
            return Err(PaymentError::Validation(format!(
                "amount must be between {MIN_AMOUNT_MINOR} and {MAX_AMOUNT_MINOR}, got {minor}"
            )));
        }
        let timeout_minutes = req.timeout_minutes.unwrap_or(DEFAULT_TIMEOUT_MINUTES);
        if timeout_minutes <= 0 {
            return Err(PaymentError::Validation(format!(
                "timeout_minutes must be positive, got {timeout_minutes}"
            )));
        }

        if let Some(existing) = self.find_by_order(&req.order_id).await? {
            tracing::info!(
                order_id = %req.order_id,
                payment_id = %existing.payment_id(),
                "create resolved to existing payment"
            );
            return Ok(CreateOutcome {
                payment: existing,
                handle: ProviderHandle::None,
                created: false,
            });
        }

        let now = Utc::now();
        let payment = Payment::pending(
            NewPayment {
                order_id: req.order_id.clone(),
                amount: req.amount,
                method: req.method,
                provider: req.provider,
                payer_id: req.payer_id,
                recipient_id: req.recipient_id,
                branch_id: req.branch_id,
                timeout: Duration::minutes(timeout_minutes),
            },
            now,
        );

        let payment = match self.store.create(payment).await {
            Ok(p) => p,
            // Lost a concurrent-create race: same answer as the idempotent
            // path above.
            Err(PaymentError::DuplicateOrderId(_)) => {
                let existing = self.store.get_by_order_id(&req.order_id).await?;
                return Ok(CreateOutcome {
                    payment: existing,
                    handle: ProviderHandle::None,
                    created: false,
                });
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            payment_id = %payment.payment_id(),
            order_id = %payment.order_id(),
            method = %payment.method(),
            provider = %payment.provider(),
            amount = %payment.amount().amount(),
            "payment created"
        );

        // Cash is settled at the desk; there is no provider flow to start.
        if payment.method() == PaymentMethod::Cash {
            return Ok(CreateOutcome {
                payment,
                handle: ProviderHandle::None,
                created: true,
            });
        }

        // An initiate failure leaves the PENDING row in place: a later
        // webhook or the sweeper reconciles it.
        let gateway = self.gateways.for_provider(payment.provider())?;
        let outcome = gateway.initiate(&payment, &req.urls).await?;

        let payment = match outcome.external_payment_key {
            Some(key) => self.record_external_key(payment, key).await?,
            None => payment,
        };

        Ok(CreateOutcome {
            payment,
            handle: outcome.handle,
            created: true,
        })
    }

    async fn find_by_order(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentError> {
        match self.store.get_by_order_id(order_id).await {
            Ok(p) => Ok(Some(p)),
            Err(PaymentError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Best-effort: a concurrent webhook may already have moved the
    /// payment on, in which case its key (from the webhook) wins.
    async fn record_external_key(
        &self,
        payment: Payment,
        key: String,
    ) -> Result<Payment, PaymentError> {
        match self
            .store
            .compare_and_swap_status(
                payment.payment_id(),
                payment.version(),
                StatusChange::record_external_key(key),
            )
            .await
        {
            Ok(updated) => Ok(updated),
            Err(PaymentError::VersionConflict { .. }) => {
                self.store.get_by_payment_id(payment.payment_id()).await
            }
            Err(e) => Err(e),
        }
    }

    // ── webhook application ────────────────────────────────────────────

    /// Verify, parse, and idempotently apply a provider webhook. Replayed
    /// deliveries resolve to `AlreadyApplied` without touching the row.
    pub async fn apply_webhook(
        &self,
        provider: ProviderKind,
        raw_body: &str,
        sig_header: &str,
        ts_header: &str,
    ) -> Result<WebhookOutcome, PaymentError> {
        let now = Utc::now();
        let gateway = self.gateways.for_provider(provider)?;
        gateway.verify_webhook(raw_body, sig_header, ts_header, now)?;

        let payload: WebhookPayload = serde_json::from_str(raw_body)?;
        let event = payload.into_event()?;
        if event.provider != provider {
            return Err(PaymentError::Validation(format!(
                "webhook posted to {provider} but payload names {}",
                event.provider
            )));
        }

        let payment = match &event.key {
            PaymentKey::Payment(id) => self.store.get_by_payment_id(id).await?,
            PaymentKey::Order(order_id) => self.store.get_by_order_id(order_id).await?,
        };

        // Authoritative amount lives on our row; a tampered client/provider
        // report is rejected, never reconciled by adjusting the record.
        if event.amount != payment.amount() {
            tracing::warn!(
                payment_id = %payment.payment_id(),
                stored = %payment.amount().amount(),
                reported = %event.amount.amount(),
                "webhook amount mismatch, flagged for manual review"
            );
            return Err(PaymentError::AmountMismatch {
                stored: payment.amount().amount().minor(),
                reported: event.amount.amount().minor(),
            });
        }

        let target = event.status.target();
        let change = match event.status {
            WebhookStatus::Approved => StatusChange::approve(
                event.approved_at.unwrap_or(now),
                event.external_payment_key.clone(),
            ),
            WebhookStatus::Failed => {
                StatusChange::fail(Some("provider reported failure".to_string()))
            }
            WebhookStatus::Cancelled => {
                StatusChange::cancel(now, Some("provider reported cancellation".to_string()))
            }
        };

        self.drive(payment, move |p| {
            if p.status() == target {
                return Ok(Decision::AlreadyApplied);
            }
            if !p.status().can_transition_to(&target) {
                return Err(PaymentError::IllegalTransition {
                    from: p.status(),
                    to: target,
                });
            }
            Ok(Decision::Apply(change.clone()))
        })
        .await
    }

    // ── admin cancel ───────────────────────────────────────────────────

    /// Cancel a payment. PENDING cancels locally (nothing captured yet);
    /// APPROVED voids at the provider first; a timed-out provider call
    /// leaves local state untouched.
    pub async fn cancel(
        &self,
        id: &PaymentId,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        let mut current = self.store.get_by_payment_id(id).await?;
        // The provider is voided at most once even if the CAS retries.
        let mut voided = false;

        for _ in 0..MAX_TRANSITION_RETRIES {
            match current.status() {
                PaymentStatus::Cancelled => return Ok(current),
                PaymentStatus::Pending | PaymentStatus::Approved => {
                    if current.status() == PaymentStatus::Approved && !voided {
                        let gateway = self.gateways.for_provider(current.provider())?;
                        gateway.cancel(&current, reason.as_deref()).await?;
                        voided = true;
                    }
                    let change = StatusChange::cancel(Utc::now(), reason.clone());
                    match self
                        .store
                        .compare_and_swap_status(id, current.version(), change)
                        .await
                    {
                        Ok(updated) => {
                            tracing::info!(payment_id = %id, from = %current.status(), "payment cancelled");
                            notify_transition(self.notifier.clone(), &updated);
                            return Ok(updated);
                        }
                        Err(PaymentError::VersionConflict { .. }) => {
                            current = self.store.get_by_payment_id(id).await?;
                        }
                        Err(e) => return Err(e),
                    }
                }
                other => {
                    return Err(PaymentError::IllegalTransition {
                        from: other,
                        to: PaymentStatus::Cancelled,
                    });
                }
            }
        }

        tracing::error!(payment_id = %id, "cancel exhausted CAS retries, needs manual reconciliation");
        Err(PaymentError::VersionConflict {
            payment_id: id.as_str().to_string(),
            expected: current.version(),
        })
    }

    // ── admin refund ───────────────────────────────────────────────────

    /// Refund part or all of an APPROVED payment. `amount: None` refunds
    /// the remaining balance. The provider is called exactly once; only
    /// the local recording retries on CAS conflicts.
    pub async fn refund(
        &self,
        id: &PaymentId,
        amount: Option<MoneyAmount>,
        reason: Option<String>,
    ) -> Result<Payment, PaymentError> {
        let mut current = self.store.get_by_payment_id(id).await?;

        if current.status() != PaymentStatus::Approved {
            return Err(PaymentError::IllegalTransition {
                from: current.status(),
                to: PaymentStatus::Refunded,
            });
        }

        let remaining = current.remaining_refundable();
        let requested = amount.unwrap_or(remaining);
        if requested.is_zero() {
            return Err(PaymentError::Validation(
                "refund amount must be positive".into(),
            ));
        }
        if requested > remaining {
            return Err(PaymentError::RefundExceedsAmount {
                requested: requested.minor(),
                remaining: remaining.minor(),
            });
        }

        let gateway = self.gateways.for_provider(current.provider())?;
        gateway.refund(&current, requested, reason.as_deref()).await?;

        // The provider has moved the money; record it locally, tolerating
        // concurrent writers (another partial refund, a cancel webhook).
        for _ in 0..MAX_TRANSITION_RETRIES {
            if current.status() != PaymentStatus::Approved {
                tracing::error!(
                    payment_id = %id,
                    status = %current.status(),
                    refunded = %requested,
                    "provider refund succeeded but payment left APPROVED, needs manual reconciliation"
                );
                return Err(PaymentError::IllegalTransition {
                    from: current.status(),
                    to: PaymentStatus::Refunded,
                });
            }

            let new_total = current
                .refunded_amount()
                .checked_add(requested)
                .filter(|t| *t <= current.amount().amount())
                .ok_or(PaymentError::RefundExceedsAmount {
                    requested: requested.minor(),
                    remaining: current.remaining_refundable().minor(),
                })?;

            let change = if new_total == current.amount().amount() {
                StatusChange::refund_full(new_total, Utc::now(), reason.clone())
            } else {
                StatusChange::refund_partial(new_total)
            };

            match self
                .store
                .compare_and_swap_status(id, current.version(), change)
                .await
            {
                Ok(updated) => {
                    tracing::info!(
                        payment_id = %id,
                        refunded = %requested,
                        total_refunded = %updated.refunded_amount(),
                        status = %updated.status(),
                        "refund recorded"
                    );
                    if updated.status() != current.status() {
                        notify_transition(self.notifier.clone(), &updated);
                    }
                    return Ok(updated);
                }
                Err(PaymentError::VersionConflict { .. }) => {
                    current = self.store.get_by_payment_id(id).await?;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(payment_id = %id, "refund exhausted CAS retries, needs manual reconciliation");
        Err(PaymentError::VersionConflict {
            payment_id: id.as_str().to_string(),
            expected: current.version(),
        })
    }

    // ── verification & reads ───────────────────────────────────────────

    /// Exact-amount check against the authoritative record: valid only for
    /// an APPROVED payment whose stored amount equals the reported one.
    pub async fn verify(&self, id: &PaymentId, amount: Money) -> Result<bool, PaymentError> {
        let payment = self.store.get_by_payment_id(id).await?;
        Ok(payment.status() == PaymentStatus::Approved && payment.amount() == amount)
    }

    pub async fn get(&self, id: &PaymentId) -> Result<Payment, PaymentError> {
        self.store.get_by_payment_id(id).await
    }

    pub async fn list(&self, filter: &PaymentFilter) -> Result<Vec<Payment>, PaymentError> {
        self.store.list(filter).await
    }

    // ── expiry ─────────────────────────────────────────────────────────

    /// Move one overdue PENDING payment to EXPIRED through the same CAS
    /// path webhooks use. Returns `None` when another writer resolved the
    /// payment first (the race the CAS guard exists for).
    pub async fn expire(
        &self,
        payment: Payment,
        now: DateTime<Utc>,
    ) -> Result<Option<Payment>, PaymentError> {
        let mut current = payment;

        for _ in 0..MAX_TRANSITION_RETRIES {
            if !current.is_expired(now) {
                return Ok(None);
            }
            match self
                .store
                .compare_and_swap_status(current.payment_id(), current.version(), StatusChange::expire())
                .await
            {
                Ok(updated) => {
                    tracing::info!(
                        payment_id = %updated.payment_id(),
                        expired_at = %updated.expires_at(),
                        "payment expired"
                    );
                    return Ok(Some(updated));
                }
                Err(PaymentError::VersionConflict { .. }) => {
                    current = self.store.get_by_payment_id(current.payment_id()).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// One sweep pass: expire every overdue PENDING payment. Per-payment
    /// failures are logged and skipped so one bad row never aborts the
    /// sweep.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, PaymentError> {
        let candidates = self.store.list_expired_pending(now, SWEEP_BATCH).await?;
        let mut expired = 0;

        for payment in candidates {
            let id = payment.payment_id().clone();
            match self.expire(payment, now).await {
                Ok(Some(_)) => expired += 1,
                Ok(None) => {
                    tracing::debug!(payment_id = %id, "sweep candidate resolved concurrently, skipped");
                }
                Err(e) => {
                    tracing::warn!(payment_id = %id, error = %e, "sweep failed for payment, skipped");
                }
            }
        }

        Ok(expired)
    }

    // ── shared CAS loop ────────────────────────────────────────────────

    /// Idempotency core: re-evaluate `decide` against fresh state after
    /// every lost CAS, so a concurrent writer that already reached the
    /// target turns this call into a no-op.
    async fn drive(
        &self,
        payment: Payment,
        decide: impl Fn(&Payment) -> Result<Decision, PaymentError>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let mut current = payment;

        for _ in 0..MAX_TRANSITION_RETRIES {
            match decide(&current)? {
                Decision::AlreadyApplied => {
                    return Ok(WebhookOutcome::AlreadyApplied(current));
                }
                Decision::Apply(change) => {
                    match self
                        .store
                        .compare_and_swap_status(current.payment_id(), current.version(), change)
                        .await
                    {
                        Ok(updated) => {
                            if updated.status() != current.status() {
                                notify_transition(self.notifier.clone(), &updated);
                            }
                            return Ok(WebhookOutcome::Applied(updated));
                        }
                        Err(PaymentError::VersionConflict { .. }) => {
                            current = self.store.get_by_payment_id(current.payment_id()).await?;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        tracing::error!(
            payment_id = %current.payment_id(),
            "transition exhausted CAS retries, needs manual reconciliation"
        );
        Err(PaymentError::VersionConflict {
            payment_id: current.payment_id().as_str().to_string(),
            expected: current.version(),
        })
    }
}

#![allow(dead_code)]

use {
    async_trait::async_trait,
    chrono::Utc,
    pay_sync::domain::error::PaymentError,
    pay_sync::domain::id::OrderId,
    pay_sync::domain::money::{Money, MoneyAmount},
    pay_sync::domain::payment::{
        NewPayment, Payment, PaymentMethod, ProviderKind,
    },
    pay_sync::gateway::{
        GatewayRegistry, InitiateOutcome, ProviderGateway, ProviderHandle, ReturnUrls, signature,
    },
    pay_sync::services::lifecycle::{CreateRequest, LifecycleEngine},
    pay_sync::services::notify::{NotificationEvent, Notifier, NotifyError},
    pay_sync::store::{PaymentStore, memory::MemoryStore},
    std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    tokio::sync::{Mutex, mpsc},
};

pub const WEBHOOK_SECRET: &str = "whsec_pay_sync_test";

// ── Mock provider gateway ──────────────────────────────────────────────

/// Scriptable in-process gateway: counts calls and can simulate a
/// timed-out (unknown outcome) or definitively rejected provider call.
pub struct MockGateway {
    provider: ProviderKind,
    method: PaymentMethod,
    pub initiate_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub refund_calls: AtomicUsize,
    pub timeout_cancel: AtomicBool,
    pub reject_cancel: AtomicBool,
    pub timeout_refund: AtomicBool,
    pub reject_refund: AtomicBool,
}

impl MockGateway {
    pub fn new(provider: ProviderKind, method: PaymentMethod) -> Self {
        Self {
            provider,
            method,
            initiate_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            refund_calls: AtomicUsize::new(0),
            timeout_cancel: AtomicBool::new(false),
            reject_cancel: AtomicBool::new(false),
            timeout_refund: AtomicBool::new(false),
            reject_refund: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn method(&self) -> PaymentMethod {
        self.method
    }

    fn webhook_secret(&self) -> &str {
        WEBHOOK_SECRET
    }

    async fn initiate(
        &self,
        payment: &Payment,
        _urls: &ReturnUrls,
    ) -> Result<InitiateOutcome, PaymentError> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(InitiateOutcome {
            handle: ProviderHandle::Redirect {
                checkout_url: format!("https://pay.test/checkout/{}", payment.order_id()),
            },
            external_payment_key: Some(format!("tx_{}", payment.order_id())),
        })
    }

    async fn cancel(&self, _payment: &Payment, _reason: Option<&str>) -> Result<(), PaymentError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.timeout_cancel.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderUnavailable(
                "provider call timed out".into(),
            ));
        }
        if self.reject_cancel.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderRejected("HTTP 400".into()));
        }
        Ok(())
    }

    async fn refund(
        &self,
        _payment: &Payment,
        _amount: MoneyAmount,
        _reason: Option<&str>,
    ) -> Result<(), PaymentError> {
        self.refund_calls.fetch_add(1, Ordering::SeqCst);
        if self.timeout_refund.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderUnavailable(
                "provider call timed out".into(),
            ));
        }
        if self.reject_refund.load(Ordering::SeqCst) {
            return Err(PaymentError::ProviderRejected("HTTP 400".into()));
        }
        Ok(())
    }
}

// ── Recording notifier ─────────────────────────────────────────────────

pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<(i64, &'static str)>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        user_id: i64,
        event: NotificationEvent,
        _params: serde_json::Value,
    ) -> Result<(), NotifyError> {
        let _ = self.tx.send((user_id, event.as_str()));
        Ok(())
    }
}

// ── Harness ────────────────────────────────────────────────────────────

pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<MockGateway>,
    pub notified: Mutex<mpsc::UnboundedReceiver<(i64, &'static str)>>,
}

/// In-memory store + mock TOSS card gateway; every entry point of the
/// engine is exercised exactly as in production, minus real I/O.
pub fn setup() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let gateway = Arc::new(MockGateway::new(ProviderKind::Toss, PaymentMethod::Card));
    let registry = GatewayRegistry::new().register(gateway.clone());
    let (tx, rx) = mpsc::unbounded_channel();

    let store_dyn: Arc<dyn PaymentStore> = store.clone();
    let engine = Arc::new(LifecycleEngine::new(
        store_dyn,
        Arc::new(registry),
        Arc::new(RecordingNotifier { tx }),
    ));

    Harness {
        engine,
        store,
        gateway,
        notified: Mutex::new(rx),
    }
}

/// Build a card-payment create request with sensible defaults.
pub fn make_create(order_id: &str, amount: i64) -> CreateRequest {
    CreateRequest {
        order_id: OrderId::new(order_id).unwrap(),
        amount: Money::krw(amount).unwrap(),
        method: PaymentMethod::Card,
        provider: ProviderKind::Toss,
        payer_id: 11,
        recipient_id: 22,
        branch_id: 33,
        timeout_minutes: Some(30),
        urls: ReturnUrls::default(),
    }
}

/// Insert a PENDING payment whose expiry is already in the past, bypassing
/// the engine's timeout validation.
pub async fn insert_overdue_pending(
    store: &Arc<MemoryStore>,
    order_id: &str,
    amount: i64,
) -> Payment {
    let payment = Payment::pending(
        NewPayment {
            order_id: OrderId::new(order_id).unwrap(),
            amount: Money::krw(amount).unwrap(),
            method: PaymentMethod::Card,
            provider: ProviderKind::Toss,
            payer_id: 11,
            recipient_id: 22,
            branch_id: 33,
            timeout: chrono::Duration::seconds(-5),
        },
        Utc::now(),
    );
    store.create(payment).await.unwrap()
}

// ── Signed webhook deliveries ──────────────────────────────────────────

/// Body + matching signature and timestamp headers, as a provider would
/// post them.
pub fn signed_webhook(order_id: &str, status: &str, amount: i64) -> (String, String, String) {
    let body = serde_json::json!({
        "orderId": order_id,
        "status": status,
        "amount": amount,
        "method": "CARD",
        "provider": "TOSS",
        "externalPaymentKey": format!("tx_{order_id}"),
    })
    .to_string();
    let ts = Utc::now().timestamp();
    let sig = signature::sign(WEBHOOK_SECRET, ts, &body);
    (body, sig, ts.to_string())
}

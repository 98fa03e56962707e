use {
    super::error::PaymentError,
    super::id::{OrderId, PaymentId},
    super::money::{Currency, Money, MoneyAmount},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Cancelled,
    Refunded,
    Expired,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
            Self::Expired => "EXPIRED",
            Self::Failed => "FAILED",
        }
    }

    /// Legal transition edges. `Approved` is the only non-absorbing
    /// post-Pending state; everything else is terminal.
    pub fn can_transition_to(&self, next: &PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Approved)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Pending, PaymentStatus::Expired)
                | (PaymentStatus::Pending, PaymentStatus::Cancelled)
                | (PaymentStatus::Approved, PaymentStatus::Cancelled)
                | (PaymentStatus::Approved, PaymentStatus::Refunded)
        )
    }

    pub fn is_absorbing(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Refunded | Self::Expired | Self::Failed
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentStatus {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            "EXPIRED" => Ok(Self::Expired),
            "FAILED" => Ok(Self::Failed),
            other => Err(PaymentError::Validation(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    VirtualAccount,
    Mobile,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "CARD",
            Self::BankTransfer => "BANK_TRANSFER",
            Self::VirtualAccount => "VIRTUAL_ACCOUNT",
            Self::Mobile => "MOBILE",
            Self::Cash => "CASH",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "CARD" => Ok(Self::Card),
            "BANK_TRANSFER" => Ok(Self::BankTransfer),
            "VIRTUAL_ACCOUNT" => Ok(Self::VirtualAccount),
            "MOBILE" => Ok(Self::Mobile),
            "CASH" => Ok(Self::Cash),
            other => Err(PaymentError::Validation(format!(
                "unknown payment method: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    Toss,
    Iamport,
    Kakao,
    Naver,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toss => "TOSS",
            Self::Iamport => "IAMPORT",
            Self::Kakao => "KAKAO",
            Self::Naver => "NAVER",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ProviderKind {
    type Error = PaymentError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "TOSS" => Ok(Self::Toss),
            "IAMPORT" => Ok(Self::Iamport),
            "KAKAO" => Ok(Self::Kakao),
            "NAVER" => Ok(Self::Naver),
            other => Err(PaymentError::Validation(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Input for creating a PENDING payment. Ids and timestamps are stamped by
/// `Payment::pending`.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub provider: ProviderKind,
    pub payer_id: i64,
    pub recipient_id: i64,
    pub branch_id: i64,
    pub timeout: chrono::Duration,
}

/// Field set applied atomically by `compare_and_swap_status` together with
/// the version bump. Constructors keep the per-state timestamp discipline in
/// one place; `None` fields are left untouched on the stored record.
#[derive(Debug, Clone)]
pub struct StatusChange {
    new_status: PaymentStatus,
    approved_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    refunded_amount: Option<MoneyAmount>,
    external_payment_key: Option<String>,
    failure_reason: Option<String>,
}

impl StatusChange {
    fn bare(new_status: PaymentStatus) -> Self {
        Self {
            new_status,
            approved_at: None,
            cancelled_at: None,
            refunded_at: None,
            refunded_amount: None,
            external_payment_key: None,
            failure_reason: None,
        }
    }

    pub fn approve(at: DateTime<Utc>, external_payment_key: Option<String>) -> Self {
        Self {
            approved_at: Some(at),
            external_payment_key,
            ..Self::bare(PaymentStatus::Approved)
        }
    }

    pub fn fail(reason: Option<String>) -> Self {
        Self {
            failure_reason: reason,
            ..Self::bare(PaymentStatus::Failed)
        }
    }

    pub fn expire() -> Self {
        Self {
            failure_reason: Some("payment window expired".to_string()),
            ..Self::bare(PaymentStatus::Expired)
        }
    }

    pub fn cancel(at: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            cancelled_at: Some(at),
            failure_reason: reason,
            ..Self::bare(PaymentStatus::Cancelled)
        }
    }

    /// Partial refund: status stays APPROVED, only the accumulator moves.
    pub fn refund_partial(new_refunded_total: MoneyAmount) -> Self {
        Self {
            refunded_amount: Some(new_refunded_total),
            ..Self::bare(PaymentStatus::Approved)
        }
    }

    pub fn refund_full(total: MoneyAmount, at: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            refunded_at: Some(at),
            refunded_amount: Some(total),
            failure_reason: reason,
            ..Self::bare(PaymentStatus::Refunded)
        }
    }

    /// Record the provider's key on a still-PENDING payment (synchronous
    /// acknowledgement from `initiate`). Status does not move.
    pub fn record_external_key(key: String) -> Self {
        Self {
            external_payment_key: Some(key),
            ..Self::bare(PaymentStatus::Pending)
        }
    }

    pub fn new_status(&self) -> PaymentStatus {
        self.new_status
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn refunded_amount(&self) -> Option<MoneyAmount> {
        self.refunded_amount
    }

    pub fn external_payment_key(&self) -> Option<&str> {
        self.external_payment_key.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

/// The central record. Mutated only through `compare_and_swap_status`; rows
/// are never deleted, terminal states are retained for audit and statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    payment_id: PaymentId,
    order_id: OrderId,
    amount: Money,
    method: PaymentMethod,
    provider: ProviderKind,
    payer_id: i64,
    recipient_id: i64,
    branch_id: i64,
    status: PaymentStatus,
    external_payment_key: Option<String>,
    version: i64,
    refunded_amount: MoneyAmount,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    approved_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn pending(new: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            payment_id: PaymentId::generate(),
            order_id: new.order_id,
            amount: new.amount,
            method: new.method,
            provider: new.provider,
            payer_id: new.payer_id,
            recipient_id: new.recipient_id,
            branch_id: new.branch_id,
            status: PaymentStatus::Pending,
            external_payment_key: None,
            version: 0,
            refunded_amount: MoneyAmount::ZERO,
            failure_reason: None,
            created_at: now,
            expires_at: now + new.timeout,
            approved_at: None,
            cancelled_at: None,
            refunded_at: None,
        }
    }

    /// The successor record a committed CAS produces: `change` merged in,
    /// version incremented by exactly one.
    pub fn apply(&self, change: &StatusChange) -> Payment {
        let mut next = self.clone();
        next.status = change.new_status;
        next.version = self.version + 1;
        if let Some(at) = change.approved_at {
            next.approved_at = Some(at);
        }
        if let Some(at) = change.cancelled_at {
            next.cancelled_at = Some(at);
        }
        if let Some(at) = change.refunded_at {
            next.refunded_at = Some(at);
        }
        if let Some(total) = change.refunded_amount {
            next.refunded_amount = total;
        }
        if let Some(key) = &change.external_payment_key {
            next.external_payment_key = Some(key.clone());
        }
        if let Some(reason) = &change.failure_reason {
            next.failure_reason = Some(reason.clone());
        }
        next
    }

    /// Balance still refundable. The accumulator invariant
    /// (`refunded_amount <= amount`) makes this total.
    pub fn remaining_refundable(&self) -> MoneyAmount {
        self.amount
            .amount()
            .checked_sub(self.refunded_amount)
            .unwrap_or(MoneyAmount::ZERO)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && now > self.expires_at
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn payer_id(&self) -> i64 {
        self.payer_id
    }

    pub fn recipient_id(&self) -> i64 {
        self.recipient_id
    }

    pub fn branch_id(&self) -> i64 {
        self.branch_id
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn external_payment_key(&self) -> Option<&str> {
        self.external_payment_key.as_deref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn refunded_amount(&self) -> MoneyAmount {
        self.refunded_amount
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }
}

/// Raw column set a store implementation rehydrates a `Payment` from.
/// Enum columns are stored as their `as_str` forms and validated on load.
#[derive(Debug, Clone)]
pub struct PaymentRecord {
    pub payment_id: String,
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub method: String,
    pub provider: String,
    pub payer_id: i64,
    pub recipient_id: i64,
    pub branch_id: i64,
    pub status: String,
    pub external_payment_key: Option<String>,
    pub version: i64,
    pub refunded_amount: i64,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRecord> for Payment {
    type Error = PaymentError;

    fn try_from(r: PaymentRecord) -> Result<Self, Self::Error> {
        Ok(Payment {
            payment_id: PaymentId::parse(r.payment_id)?,
            order_id: OrderId::new(r.order_id)?,
            amount: Money::new(
                MoneyAmount::new(r.amount)?,
                Currency::try_from(r.currency.as_str())?,
            ),
            method: PaymentMethod::try_from(r.method.as_str())?,
            provider: ProviderKind::try_from(r.provider.as_str())?,
            payer_id: r.payer_id,
            recipient_id: r.recipient_id,
            branch_id: r.branch_id,
            status: PaymentStatus::try_from(r.status.as_str())?,
            external_payment_key: r.external_payment_key,
            version: r.version,
            refunded_amount: MoneyAmount::new(r.refunded_amount)?,
            failure_reason: r.failure_reason,
            created_at: r.created_at,
            expires_at: r.expires_at,
            approved_at: r.approved_at,
            cancelled_at: r.cancelled_at,
            refunded_at: r.refunded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbing_states_have_no_outgoing_edges() {
        use PaymentStatus::*;
        for from in [Cancelled, Refunded, Expired, Failed] {
            for to in [Pending, Approved, Cancelled, Refunded, Expired, Failed] {
                assert!(!from.can_transition_to(&to), "{from} → {to} must be illegal");
            }
        }
    }

    #[test]
    fn approved_only_reaches_cancelled_or_refunded() {
        use PaymentStatus::*;
        assert!(Approved.can_transition_to(&Cancelled));
        assert!(Approved.can_transition_to(&Refunded));
        assert!(!Approved.can_transition_to(&Pending));
        assert!(!Approved.can_transition_to(&Expired));
        assert!(!Approved.can_transition_to(&Failed));
        assert!(!Approved.can_transition_to(&Approved));
    }

    #[test]
    fn apply_increments_version_by_one() {
        let p = Payment::pending(
            NewPayment {
                order_id: OrderId::new("ORD-1").unwrap(),
                amount: Money::krw(50_000).unwrap(),
                method: PaymentMethod::Card,
                provider: ProviderKind::Toss,
                payer_id: 1,
                recipient_id: 2,
                branch_id: 3,
                timeout: chrono::Duration::minutes(30),
            },
            Utc::now(),
        );
        assert_eq!(p.version(), 0);

        let approved = p.apply(&StatusChange::approve(Utc::now(), Some("tx_1".into())));
        assert_eq!(approved.version(), 1);
        assert_eq!(approved.status(), PaymentStatus::Approved);
        assert_eq!(approved.external_payment_key(), Some("tx_1"));
        // untouched fields carry over
        assert_eq!(approved.order_id(), p.order_id());
        assert_eq!(approved.refunded_amount(), MoneyAmount::ZERO);
    }
}

use {
    super::errors::ApiError,
    crate::AppState,
    crate::domain::id::{OrderId, PaymentId},
    crate::domain::money::{Currency, Money, MoneyAmount},
    crate::domain::payment::{PaymentMethod, PaymentStatus, ProviderKind},
    crate::gateway::ReturnUrls,
    crate::services::lifecycle::CreateRequest,
    crate::store::PaymentFilter,
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
    },
    chrono::Utc,
    serde::Deserialize,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentBody {
    pub order_id: String,
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    pub method: String,
    pub provider: String,
    pub payer_id: i64,
    pub recipient_id: i64,
    pub branch_id: i64,
    #[serde(default)]
    pub timeout_minutes: Option<i64>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub fail_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

pub async fn create_payment(
    State(state): State<AppState>,
    Json(body): Json<CreatePaymentBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let currency = match body.currency.as_deref() {
        Some(c) => Currency::try_from(c)?,
        None => Currency::Krw,
    };

    let req = CreateRequest {
        order_id: OrderId::new(body.order_id)?,
        amount: Money::new(MoneyAmount::new(body.amount)?, currency),
        method: PaymentMethod::try_from(body.method.as_str())?,
        provider: ProviderKind::try_from(body.provider.as_str())?,
        payer_id: body.payer_id,
        recipient_id: body.recipient_id,
        branch_id: body.branch_id,
        timeout_minutes: body.timeout_minutes,
        urls: ReturnUrls {
            success_url: body.success_url,
            fail_url: body.fail_url,
            cancel_url: body.cancel_url,
        },
    };

    let outcome = state.engine.create(req).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(serde_json::json!({
            "payment": outcome.payment,
            "handle": outcome.handle,
            "created": outcome.created,
        })),
    ))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = PaymentId::parse(payment_id)?;
    let payment = state.engine.get(&id).await?;
    Ok(Json(serde_json::json!({ "payment": payment })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub payer_id: Option<i64>,
    #[serde(default)]
    pub branch_id: Option<i64>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = PaymentFilter {
        status: params
            .status
            .as_deref()
            .map(PaymentStatus::try_from)
            .transpose()?,
        method: params
            .method
            .as_deref()
            .map(PaymentMethod::try_from)
            .transpose()?,
        provider: params
            .provider
            .as_deref()
            .map(ProviderKind::try_from)
            .transpose()?,
        payer_id: params.payer_id,
        branch_id: params.branch_id,
        ..Default::default()
    };

    let payments = state.engine.list(&filter).await?;
    Ok(Json(serde_json::json!({
        "count": payments.len(),
        "payments": payments,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Reason body is optional; an empty POST cancels without one.
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = PaymentId::parse(payment_id)?;
    let body: CancelBody = parse_optional_body(&body)?;
    let payment = state.engine.cancel(&id, body.reason).await?;
    Ok(Json(serde_json::json!({ "payment": payment })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// `amount` omitted refunds the remaining balance.
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = PaymentId::parse(payment_id)?;
    let body: RefundBody = parse_optional_body(&body)?;
    let amount = body.amount.map(MoneyAmount::new).transpose()?;
    let payment = state.engine.refund(&id, amount, body.reason).await?;
    Ok(Json(serde_json::json!({ "payment": payment })))
}

fn parse_optional_body<T: Default + serde::de::DeserializeOwned>(
    body: &str,
) -> Result<T, crate::domain::error::PaymentError> {
    if body.trim().is_empty() {
        Ok(T::default())
    } else {
        Ok(serde_json::from_str(body)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
}

pub async fn verify_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = PaymentId::parse(payment_id)?;
    let currency = match body.currency.as_deref() {
        Some(c) => Currency::try_from(c)?,
        None => Currency::Krw,
    };
    let amount = Money::new(MoneyAmount::new(body.amount)?, currency);
    let valid = state.engine.verify(&id, amount).await?;
    Ok(Json(serde_json::json!({ "valid": valid })))
}

/// Admin-triggered sweep, same path the background sweeper takes.
pub async fn sweep_expired(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let expired = state.engine.sweep_expired(Utc::now()).await?;
    Ok(Json(serde_json::json!({ "expired": expired })))
}

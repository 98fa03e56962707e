use {
    super::{
        GatewayConfig, InitiateOutcome, ProviderGateway, ProviderHandle, ReturnUrls, external_key,
        http::ProviderHttpClient,
    },
    crate::domain::error::PaymentError,
    crate::domain::money::MoneyAmount,
    crate::domain::payment::{Payment, PaymentMethod, ProviderKind},
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::Deserialize,
};

/// Virtual account flow: initiation issues a one-off account number the
/// payer wires money into before the due date; the deposit webhook drives
/// the approval. The account due date is aligned with the payment's own
/// expiry so the sweeper and the provider agree on the deadline.
pub struct VirtualAccountGateway {
    provider: ProviderKind,
    http: ProviderHttpClient,
    config: GatewayConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssuedAccount {
    account_key: String,
    bank_code: String,
    account_number: String,
    due_at: DateTime<Utc>,
}

impl VirtualAccountGateway {
    pub fn new(provider: ProviderKind, http: ProviderHttpClient, config: GatewayConfig) -> Self {
        Self {
            provider,
            http,
            config,
        }
    }
}

#[async_trait]
impl ProviderGateway for VirtualAccountGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::VirtualAccount
    }

    fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    async fn initiate(
        &self,
        payment: &Payment,
        _urls: &ReturnUrls,
    ) -> Result<InitiateOutcome, PaymentError> {
        let url = format!("{}/v1/virtual-accounts", self.config.base_url);
        let body = serde_json::json!({
            "orderId": payment.order_id().as_str(),
            "amount": payment.amount().amount().minor(),
            "currency": payment.amount().currency().as_str(),
            "dueAt": payment.expires_at(),
        });

        let resp: IssuedAccount = self
            .http
            .post_json(&url, &self.config.secret_key, &body)
            .await?;

        Ok(InitiateOutcome {
            handle: ProviderHandle::VirtualAccount {
                bank_code: resp.bank_code,
                account_number: resp.account_number,
                due_at: resp.due_at,
            },
            external_payment_key: Some(resp.account_key),
        })
    }

    async fn cancel(&self, payment: &Payment, reason: Option<&str>) -> Result<(), PaymentError> {
        let key = external_key(payment)?;
        let url = format!("{}/v1/virtual-accounts/{key}/close", self.config.base_url);
        let body = serde_json::json!({ "reason": reason });
        self.http
            .post_json::<serde_json::Value>(&url, &self.config.secret_key, &body)
            .await?;
        Ok(())
    }

    async fn refund(
        &self,
        payment: &Payment,
        amount: MoneyAmount,
        reason: Option<&str>,
    ) -> Result<(), PaymentError> {
        let key = external_key(payment)?;
        let url = format!("{}/v1/virtual-accounts/{key}/refund", self.config.base_url);
        let body = serde_json::json!({
            "amount": amount.minor(),
            "reason": reason,
        });
        self.http
            .post_json::<serde_json::Value>(&url, &self.config.secret_key, &body)
            .await?;
        Ok(())
    }
}

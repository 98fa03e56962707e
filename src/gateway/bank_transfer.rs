use {
    super::{
        GatewayConfig, InitiateOutcome, ProviderGateway, ProviderHandle, ReturnUrls, external_key,
        http::ProviderHttpClient,
    },
    crate::domain::error::PaymentError,
    crate::domain::money::MoneyAmount,
    crate::domain::payment::{Payment, PaymentMethod, ProviderKind},
    async_trait::async_trait,
    serde::Deserialize,
};

/// Direct bank transfer: the payer authenticates against their bank
/// through the provider's transfer page. Settlement confirmation is
/// asynchronous, so the transaction key often arrives only with the
/// webhook.
pub struct BankTransferGateway {
    provider: ProviderKind,
    http: ProviderHttpClient,
    config: GatewayConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferResponse {
    transfer_url: String,
    #[serde(default)]
    transfer_key: Option<String>,
}

impl BankTransferGateway {
    pub fn new(provider: ProviderKind, http: ProviderHttpClient, config: GatewayConfig) -> Self {
        Self {
            provider,
            http,
            config,
        }
    }
}

#[async_trait]
impl ProviderGateway for BankTransferGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::BankTransfer
    }

    fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    async fn initiate(
        &self,
        payment: &Payment,
        urls: &ReturnUrls,
    ) -> Result<InitiateOutcome, PaymentError> {
        let url = format!("{}/v1/transfers", self.config.base_url);
        let body = serde_json::json!({
            "orderId": payment.order_id().as_str(),
            "amount": payment.amount().amount().minor(),
            "currency": payment.amount().currency().as_str(),
            "returnUrl": urls.success_url,
            "failUrl": urls.fail_url,
        });

        let resp: TransferResponse = self
            .http
            .post_json(&url, &self.config.secret_key, &body)
            .await?;

        Ok(InitiateOutcome {
            handle: ProviderHandle::Redirect {
                checkout_url: resp.transfer_url,
            },
            external_payment_key: resp.transfer_key,
        })
    }

    async fn cancel(&self, payment: &Payment, reason: Option<&str>) -> Result<(), PaymentError> {
        let key = external_key(payment)?;
        let url = format!("{}/v1/transfers/{key}/cancel", self.config.base_url);
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
        let url = format!("{}/v1/transfers/{key}/refund", self.config.base_url);
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

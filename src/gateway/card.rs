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

/// Card checkout flow: initiation opens a hosted payment page, approval
/// arrives later on the webhook once the payer finishes 3DS.
pub struct CardGateway {
    provider: ProviderKind,
    http: ProviderHttpClient,
    config: GatewayConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutResponse {
    payment_key: String,
    checkout_url: String,
}

impl CardGateway {
    pub fn new(provider: ProviderKind, http: ProviderHttpClient, config: GatewayConfig) -> Self {
        Self {
            provider,
            http,
            config,
        }
    }
}

#[async_trait]
impl ProviderGateway for CardGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Card
    }

    fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    async fn initiate(
        &self,
        payment: &Payment,
        urls: &ReturnUrls,
    ) -> Result<InitiateOutcome, PaymentError> {
        let url = format!("{}/v1/payments", self.config.base_url);
        let body = serde_json::json!({
            "orderId": payment.order_id().as_str(),
            "amount": payment.amount().amount().minor(),
            "currency": payment.amount().currency().as_str(),
            "successUrl": urls.success_url,
            "failUrl": urls.fail_url,
            "cancelUrl": urls.cancel_url,
        });

        let resp: CheckoutResponse = self
            .http
            .post_json(&url, &self.config.secret_key, &body)
            .await?;

        Ok(InitiateOutcome {
            handle: ProviderHandle::Redirect {
                checkout_url: resp.checkout_url,
            },
            external_payment_key: Some(resp.payment_key),
        })
    }

    async fn cancel(&self, payment: &Payment, reason: Option<&str>) -> Result<(), PaymentError> {
        let key = external_key(payment)?;
        let url = format!("{}/v1/payments/{key}/cancel", self.config.base_url);
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
        let url = format!("{}/v1/payments/{key}/refund", self.config.base_url);
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

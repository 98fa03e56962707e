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

/// Mobile easy-pay (KakaoPay/NaverPay style): initiation returns an app
/// deep link; approval lands on the webhook once the payer confirms in
/// the wallet app.
pub struct MobileGateway {
    provider: ProviderKind,
    http: ProviderHttpClient,
    config: GatewayConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MobileCheckout {
    tid: String,
    app_redirect_url: String,
}

impl MobileGateway {
    pub fn new(provider: ProviderKind, http: ProviderHttpClient, config: GatewayConfig) -> Self {
        Self {
            provider,
            http,
            config,
        }
    }
}

#[async_trait]
impl ProviderGateway for MobileGateway {
    fn provider(&self) -> ProviderKind {
        self.provider
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Mobile
    }

    fn webhook_secret(&self) -> &str {
        &self.config.webhook_secret
    }

    async fn initiate(
        &self,
        payment: &Payment,
        urls: &ReturnUrls,
    ) -> Result<InitiateOutcome, PaymentError> {
        let url = format!("{}/v1/ready", self.config.base_url);
        let body = serde_json::json!({
            "partnerOrderId": payment.order_id().as_str(),
            "amount": payment.amount().amount().minor(),
            "approvalUrl": urls.success_url,
            "failUrl": urls.fail_url,
            "cancelUrl": urls.cancel_url,
        });

        let resp: MobileCheckout = self
            .http
            .post_json(&url, &self.config.secret_key, &body)
            .await?;

        Ok(InitiateOutcome {
            handle: ProviderHandle::Redirect {
                checkout_url: resp.app_redirect_url,
            },
            external_payment_key: Some(resp.tid),
        })
    }

    async fn cancel(&self, payment: &Payment, reason: Option<&str>) -> Result<(), PaymentError> {
        let key = external_key(payment)?;
        let url = format!("{}/v1/cancel", self.config.base_url);
        let body = serde_json::json!({ "tid": key, "reason": reason });
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
        let url = format!("{}/v1/refund", self.config.base_url);
        let body = serde_json::json!({
            "tid": key,
            "cancelAmount": amount.minor(),
            "reason": reason,
        });
        self.http
            .post_json::<serde_json::Value>(&url, &self.config.secret_key, &body)
            .await?;
        Ok(())
    }
}

use {
    crate::domain::error::PaymentError,
    reqwest::Client,
    serde::de::DeserializeOwned,
    serde_json::Value as JsonValue,
    std::time::Duration,
};

/// Outbound HTTP to payment providers. Every call carries a bounded
/// timeout and is attempted exactly once: cancel/refund/initiate all
/// mutate provider state, so a timed-out call is an unknown outcome the
/// caller must surface, never silently retry or assume applied.
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    timeout: Duration,
}

impl ProviderHttpClient {
    pub fn new(timeout: Duration) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::ProviderUnavailable(format!("http client init: {e}")))?;
        Ok(Self { client, timeout })
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: &str,
        body: &JsonValue,
    ) -> Result<T, PaymentError> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .bearer_auth(bearer_token)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentError::ProviderUnavailable("provider call timed out".into())
                } else {
                    PaymentError::ProviderUnavailable(format!("provider unreachable: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                PaymentError::ProviderUnavailable(format!("invalid provider response: {e}"))
            });
        }

        // Do not forward provider error bodies verbatim; the status code is
        // enough for the caller to decide retry vs abort.
        if status.is_client_error() {
            Err(PaymentError::ProviderRejected(format!("HTTP {status}")))
        } else {
            Err(PaymentError::ProviderUnavailable(format!("HTTP {status}")))
        }
    }
}

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PaymentError;

/// System-generated payment identifier (`pay_xxx`). Stable and exposed
/// externally; distinct from whatever key the provider assigns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(String);

impl PaymentId {
    pub fn generate() -> Self {
        Self(format!("pay_{}", Uuid::now_v7().simple()))
    }

    pub fn parse(id: impl Into<String>) -> Result<Self, PaymentError> {
        let id = id.into();
        if !id.starts_with("pay_") {
            return Err(PaymentError::Validation(format!(
                "PaymentId must start with pay_, got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Caller-supplied order key, unique across payments. A retried creation
/// request with the same OrderId resolves to the existing payment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Result<Self, PaymentError> {
        let id = id.into();
        if id.is_empty() || id.len() > 64 {
            return Err(PaymentError::Validation(format!(
                "OrderId must be 1..=64 characters, got {} characters",
                id.len()
            )));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(PaymentError::Validation(format!(
                "OrderId may only contain alphanumerics, '-' and '_', got: {id}"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

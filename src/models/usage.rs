use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ledger::CreditReceipt, service_type::ServiceType};
use crate::error::{ApiError, Result};

/// Body of `POST /api/usage/consume`
///
/// Fields stay loosely typed so each one can fail with its own error code,
/// in the order the endpoint checks them.
#[derive(Debug, Default, Deserialize)]
pub struct ConsumeCreditsRequest {
    #[serde(default)]
    pub service_type: Option<Value>,
    #[serde(default)]
    pub credits: Option<Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl ConsumeCreditsRequest {
    /// Parse a raw body; an empty body is treated as `{}`
    pub fn from_bytes(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ApiError::InvalidRequestBody(format!("Malformed JSON: {}", e)))?;

        if !value.is_object() {
            return Err(ApiError::InvalidRequestBody(
                "Request body must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| ApiError::InvalidRequestBody(e.to_string()))
    }

    pub fn service_type(&self) -> Result<ServiceType> {
        match &self.service_type {
            None => Err(ApiError::MissingServiceType),
            Some(Value::String(s)) if s.is_empty() => Err(ApiError::MissingServiceType),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| ApiError::InvalidServiceType(s.clone())),
            Some(other) => Err(ApiError::InvalidServiceType(other.to_string())),
        }
    }

    /// Explicit `credits` or the catalog default, bounded to `1..=max_amount`
    pub fn resolve_credits(&self, service_type: ServiceType, max_amount: i32) -> Result<i32> {
        let invalid = || ApiError::InvalidCreditAmount { max: max_amount };

        let amount = match &self.credits {
            None => i64::from(service_type.default_credits()),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => i,
                // Accept integral floats such as `2.0`, reject fractions
                None => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
                    _ => return Err(invalid()),
                },
            },
            Some(_) => return Err(invalid()),
        };

        if amount <= 0 || amount > i64::from(max_amount) {
            return Err(invalid());
        }

        i32::try_from(amount).map_err(|_| invalid())
    }

    pub fn metadata(&self) -> Result<Map<String, Value>> {
        match &self.metadata {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map.clone()),
            Some(_) => Err(ApiError::InvalidRequestBody(
                "metadata must be a JSON object".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConsumeCreditsResponse {
    pub success: bool,
    pub message: String,
    pub data: ConsumeCreditsData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConsumeCreditsData {
    pub service_type: ServiceType,
    pub service_name: &'static str,
    pub credits_consumed: i32,
    /// Absent only when the ledger committed without reporting a balance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_credits: Option<i32>,
    pub user_type: Option<String>,
    /// Echoed exactly as the ledger returned it
    pub event_id: Option<Value>,
}

impl ConsumeCreditsResponse {
    pub fn from_receipt(service_type: ServiceType, receipt: CreditReceipt) -> Self {
        let (warning, warning_code) = match receipt.warning {
            Some(w) => (Some(w.message), Some(w.code)),
            None => (None, None),
        };

        Self {
            success: true,
            message: format!("{} credits consumed", service_type.display_name()),
            data: ConsumeCreditsData {
                service_type,
                service_name: service_type.display_name(),
                credits_consumed: receipt.credits_consumed,
                remaining_credits: receipt.remaining_credits,
                user_type: receipt.user_type,
                event_id: receipt.event_id,
            },
            warning,
            warning_code,
        }
    }
}

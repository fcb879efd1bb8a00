use serde::Serialize;
use serde_json::Value;

/// Error envelope returned with every non-2xx status
///
/// Optional fields are only present for the error codes that carry them.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_types: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_credits: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_credits: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
            error_code: code.into(),
            valid_types: None,
            required_credits: None,
            available_credits: None,
            event_id: None,
            details: None,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

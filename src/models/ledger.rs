//! Ledger procedure result types
//!
//! `consume_ai_credits` reports business failures inside a successful call
//! (`success = false` plus an error code). [`CreditConsumptionResult`] is
//! that raw JSON shape; [`LedgerOutcome`] is the tagged form the rest of the
//! crate matches on.
//!
//! Only `success` is load-bearing. Once the ledger says a debit committed,
//! gaps in the other fields are logged and relayed rather than failing the
//! request.

use serde_json::{Map, Value};
use tracing::warn;

/// Raw JSON object returned by the ledger procedure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreditConsumptionResult {
    pub success: bool,
    pub error_code: Option<String>,
    pub message: Option<String>,
    pub credits_consumed: Option<i32>,
    pub remaining_credits: Option<i32>,
    pub required_credits: Option<i32>,
    pub available_credits: Option<i32>,
    pub user_type: Option<String>,
    /// Kept as raw JSON: the procedure may return a UUID, a number or any other id
    pub event_id: Option<Value>,
    pub warning: Option<String>,
    pub warning_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOutcome {
    Consumed(CreditReceipt),
    Rejected(LedgerRejection),
}

/// A successful debit
#[derive(Debug, Clone, PartialEq)]
pub struct CreditReceipt {
    pub credits_consumed: i32,
    pub remaining_credits: Option<i32>,
    pub user_type: Option<String>,
    pub event_id: Option<Value>,
    pub warning: Option<Warning>,
}

/// Advisory notice attached to a successful debit (e.g. low balance)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: String,
    pub message: String,
}

/// A debit the ledger refused
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRejection {
    pub reason: RejectionReason,
    pub message: Option<String>,
    pub required_credits: Option<i32>,
    pub available_credits: Option<i32>,
    pub event_id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    InsufficientCredits,
    UserBanned,
    UserNotFound,
    /// Any code this service does not know about, kept verbatim
    Other(String),
}

pub const DEFAULT_WARNING_CODE: &str = "CREDIT_WARNING";
const UNKNOWN_LEDGER_ERROR: &str = "LEDGER_REJECTED";

impl RejectionReason {
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("INSUFFICIENT_CREDITS") => Self::InsufficientCredits,
            Some("USER_BANNED") => Self::UserBanned,
            Some("USER_NOT_FOUND") => Self::UserNotFound,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(UNKNOWN_LEDGER_ERROR.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::InsufficientCredits => "INSUFFICIENT_CREDITS",
            Self::UserBanned => "USER_BANNED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::Other(code) => code,
        }
    }
}

impl CreditConsumptionResult {
    /// Read the procedure's JSON result
    ///
    /// Fails only when the value is not an object or lacks a boolean
    /// `success`. Any other field that is missing or has an unexpected type
    /// is dropped with a warning.
    pub fn from_json(raw: Value) -> Result<Self, String> {
        let fields = match raw {
            Value::Object(fields) => fields,
            other => return Err(format!("expected a JSON object, got {}", other)),
        };

        let success = fields
            .get("success")
            .and_then(Value::as_bool)
            .ok_or_else(|| "result has no boolean `success` field".to_string())?;

        Ok(Self {
            success,
            error_code: string_field(&fields, "error_code"),
            message: string_field(&fields, "message"),
            credits_consumed: int_field(&fields, "credits_consumed"),
            remaining_credits: int_field(&fields, "remaining_credits"),
            required_credits: int_field(&fields, "required_credits"),
            available_credits: int_field(&fields, "available_credits"),
            user_type: string_field(&fields, "user_type"),
            event_id: fields.get("event_id").filter(|v| !v.is_null()).cloned(),
            warning: string_field(&fields, "warning"),
            warning_code: string_field(&fields, "warning_code"),
        })
    }

    /// Convert into the tagged outcome
    ///
    /// `requested_credits` stands in when a successful result omits
    /// `credits_consumed`.
    pub fn into_outcome(self, requested_credits: i32) -> LedgerOutcome {
        if !self.success {
            return LedgerOutcome::Rejected(LedgerRejection {
                reason: RejectionReason::from_code(self.error_code.as_deref()),
                message: self.message,
                required_credits: self.required_credits,
                available_credits: self.available_credits,
                event_id: self.event_id,
            });
        }

        let warning = self.warning.map(|message| Warning {
            code: self
                .warning_code
                .unwrap_or_else(|| DEFAULT_WARNING_CODE.to_string()),
            message,
        });

        LedgerOutcome::Consumed(CreditReceipt {
            credits_consumed: self.credits_consumed.unwrap_or(requested_credits),
            remaining_credits: self.remaining_credits,
            user_type: self.user_type,
            event_id: self.event_id,
            warning,
        })
    }
}

fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

fn string_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    let value = present(fields, key)?;
    let parsed = value.as_str().map(str::to_string);
    if parsed.is_none() {
        warn!(field = key, value = %value, "Ignoring ledger result field that is not a string");
    }
    parsed
}

fn int_field(fields: &Map<String, Value>, key: &str) -> Option<i32> {
    let value = present(fields, key)?;
    let parsed = value.as_i64().and_then(|n| i32::try_from(n).ok());
    if parsed.is_none() {
        warn!(field = key, value = %value, "Ignoring ledger result field that is not an integer");
    }
    parsed
}

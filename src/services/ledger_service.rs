//! Gateway to the atomic credit-debit procedure
//!
//! `consume_ai_credits` lives in the database platform and is the sole
//! authority on balances: it checks, debits and records the usage event in
//! one transaction. This gateway only marshals the call and relays the
//! result. Calls are never retried since a retry may debit twice.

use crate::models::{
    ledger::{CreditConsumptionResult, LedgerOutcome},
    service_type::ServiceType,
};
use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Statement};
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

const CONSUME_SQL: &str =
    "SELECT public.consume_ai_credits($1, $2, $3, $4, $5, $6) AS result";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger call failed: {0}")]
    Unavailable(#[from] DbErr),

    #[error("malformed ledger response: {0}")]
    MalformedResponse(String),
}

/// Parameters of a single debit
#[derive(Debug, Clone, PartialEq)]
pub struct CreditDebit {
    pub user_id: Uuid,
    pub credit_amount: i32,
    pub service_type: ServiceType,
    pub metadata: Map<String, Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl CreditDebit {
    /// Build a debit, stamping the metadata with the service display name and request time
    ///
    /// The stamped keys win over caller-supplied keys of the same name.
    pub fn new(
        user_id: Uuid,
        credit_amount: i32,
        service_type: ServiceType,
        mut metadata: Map<String, Value>,
        requested_at: OffsetDateTime,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Self, time::error::Format> {
        metadata.insert(
            "service_name".to_string(),
            Value::String(service_type.display_name().to_string()),
        );
        metadata.insert(
            "timestamp".to_string(),
            Value::String(requested_at.format(&Rfc3339)?),
        );

        Ok(Self {
            user_id,
            credit_amount,
            service_type,
            metadata,
            ip_address,
            user_agent,
        })
    }
}

#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Atomically debit credits and record the usage event
    async fn consume(&self, debit: CreditDebit) -> Result<LedgerOutcome, LedgerError>;
}

/// Ledger backed by the `consume_ai_credits` Postgres function
pub struct PostgresCreditLedger {
    db: DatabaseConnection,
}

impl PostgresCreditLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CreditLedger for PostgresCreditLedger {
    #[instrument(skip(self, debit), fields(user_id = %debit.user_id, service_type = %debit.service_type, amount = debit.credit_amount))]
    async fn consume(&self, debit: CreditDebit) -> Result<LedgerOutcome, LedgerError> {
        let requested = debit.credit_amount;

        let statement = Statement::from_sql_and_values(
            DbBackend::Postgres,
            CONSUME_SQL,
            [
                debit.user_id.into(),
                debit.credit_amount.into(),
                debit.service_type.as_str().into(),
                Value::Object(debit.metadata).into(),
                debit.ip_address.into(),
                debit.user_agent.into(),
            ],
        );

        let row = self.db.query_one(statement).await?.ok_or_else(|| {
            LedgerError::MalformedResponse("consume_ai_credits returned no row".to_string())
        })?;

        let raw: Value = row
            .try_get("", "result")
            .map_err(|e| LedgerError::MalformedResponse(e.to_string()))?;

        let outcome = CreditConsumptionResult::from_json(raw)
            .map_err(LedgerError::MalformedResponse)?
            .into_outcome(requested);

        match &outcome {
            // The debit has committed; a gap in the report must not fail the request
            LedgerOutcome::Consumed(receipt) if receipt.remaining_credits.is_none() => warn!(
                consumed = receipt.credits_consumed,
                "Ledger committed debit without reporting remaining_credits"
            ),
            LedgerOutcome::Consumed(receipt) => info!(
                remaining = receipt.remaining_credits,
                consumed = receipt.credits_consumed,
                "Credits consumed"
            ),
            LedgerOutcome::Rejected(rejection) => {
                warn!(code = rejection.reason.code(), "Ledger rejected debit")
            }
        }

        Ok(outcome)
    }
}

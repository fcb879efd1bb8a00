use std::{sync::Arc, time::Duration};

use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    config::CreditsConfig,
    error::{ApiError, Result},
    models::{
        ledger::LedgerOutcome,
        usage::{ConsumeCreditsRequest, ConsumeCreditsResponse},
    },
    services::{
        identity_service::{self, AuthError, IdentityVerifier},
        ledger_service::{CreditDebit, CreditLedger},
    },
};

/// Caller details taken from the HTTP request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub authorization: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub received_at: OffsetDateTime,
}

/// Credit consumption pipeline
///
/// Each step exits early on failure: body checks, authentication, amount
/// checks, then exactly one ledger call. Only authentication runs under a
/// deadline; once the ledger is invoked the call is awaited to completion,
/// since the debit may already have committed.
pub struct UsageService {
    identity: Arc<dyn IdentityVerifier>,
    ledger: Arc<dyn CreditLedger>,
    max_amount: i32,
    auth_timeout: Duration,
}

impl UsageService {
    pub fn new(
        identity: Arc<dyn IdentityVerifier>,
        ledger: Arc<dyn CreditLedger>,
        config: &CreditsConfig,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            ledger,
            max_amount: config.max_amount,
            auth_timeout,
        }
    }

    #[instrument(skip_all)]
    pub async fn consume(
        &self,
        request: &ConsumeCreditsRequest,
        context: RequestContext,
    ) -> Result<ConsumeCreditsResponse> {
        let service_type = request.service_type()?;

        let user = tokio::time::timeout(
            self.auth_timeout,
            identity_service::authenticate(
                self.identity.as_ref(),
                context.authorization.as_deref(),
            ),
        )
        .await
        .map_err(|_| AuthError::VerificationFailed("identity check timed out".to_string()))??;
        let email = user.email.as_deref().unwrap_or("<none>");
        let role = user.role.as_deref().unwrap_or("<none>");

        let amount = request
            .resolve_credits(service_type, self.max_amount)
            .inspect_err(|_| {
                warn!(
                    user = email,
                    role,
                    service_type = %service_type,
                    credits = ?request.credits,
                    "Rejected credit amount"
                )
            })?;
        let metadata = request.metadata()?;

        let debit = CreditDebit::new(
            user.id,
            amount,
            service_type,
            metadata,
            context.received_at,
            context.ip_address,
            context.user_agent,
        )
        .map_err(|e| ApiError::Internal(e.into()))?;

        let outcome = self.ledger.consume(debit).await.inspect_err(|e| {
            warn!(
                user = email,
                role,
                service_type = %service_type,
                amount,
                "Ledger call failed: {}",
                e
            )
        })?;

        match outcome {
            LedgerOutcome::Consumed(receipt) => {
                info!(
                    user = email,
                    role,
                    service_type = %service_type,
                    amount,
                    remaining = receipt.remaining_credits,
                    "Consumed credits"
                );
                Ok(ConsumeCreditsResponse::from_receipt(service_type, receipt))
            }
            LedgerOutcome::Rejected(rejection) => {
                warn!(
                    user = email,
                    role,
                    service_type = %service_type,
                    amount,
                    code = rejection.reason.code(),
                    "Credit consumption rejected"
                );
                Err(ApiError::Rejected(rejection))
            }
        }
    }
}

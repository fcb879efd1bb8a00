use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    models::{
        common::ErrorResponse,
        ledger::{LedgerRejection, RejectionReason},
        service_type::ServiceType,
    },
    services::{identity_service::AuthError, ledger_service::LedgerError},
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid request body: {0}")]
    InvalidRequestBody(String),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Missing service_type")]
    MissingServiceType,

    #[error("Invalid service_type: {0}")]
    InvalidServiceType(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthError),

    #[error("Invalid credit amount (must be between 1 and {max})")]
    InvalidCreditAmount { max: i32 },

    #[error("Ledger rejected the debit: {}", .0.reason.code())]
    Rejected(LedgerRejection),

    #[error("Ledger unavailable: {0}")]
    Database(#[source] LedgerError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unavailable(_) => ApiError::Database(err),
            LedgerError::MalformedResponse(msg) => {
                ApiError::Internal(anyhow::anyhow!("Malformed ledger response: {}", msg))
            }
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidRequestBody(_)
            | ApiError::MissingServiceType
            | ApiError::InvalidServiceType(_)
            | ApiError::InvalidCreditAmount { .. } => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            ApiError::Rejected(rejection) => match rejection.reason {
                RejectionReason::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
                RejectionReason::UserBanned => StatusCode::FORBIDDEN,
                RejectionReason::UserNotFound | RejectionReason::Other(_) => {
                    StatusCode::BAD_REQUEST
                }
            },
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Build the response, optionally exposing internal error details
    ///
    /// Details are only ever attached to `INTERNAL_ERROR`, and only when the
    /// caller is not running in production.
    pub fn into_response_with_details(self, expose_details: bool) -> Response {
        let status = self.status();

        let body = match self {
            ApiError::MethodNotAllowed => {
                ErrorResponse::new("METHOD_NOT_ALLOWED", "Method not allowed")
            }
            ApiError::InvalidRequestBody(ref msg) => {
                ErrorResponse::new("INVALID_REQUEST_BODY", msg.clone())
            }
            ApiError::PayloadTooLarge => {
                ErrorResponse::new("PAYLOAD_TOO_LARGE", "Request body exceeds size limit")
            }
            ApiError::MissingServiceType => {
                ErrorResponse::new("MISSING_SERVICE_TYPE", "service_type is required")
            }
            ApiError::InvalidServiceType(ref kind) => ErrorResponse {
                valid_types: Some(ServiceType::valid_types()),
                ..ErrorResponse::new(
                    "INVALID_SERVICE_TYPE",
                    format!("Invalid service_type: {}", kind),
                )
            },
            ApiError::AuthenticationFailed(ref e) => {
                tracing::warn!("Authentication failed: {}", e);
                ErrorResponse::new("AUTHENTICATION_FAILED", e.client_message())
            }
            ApiError::InvalidCreditAmount { max } => ErrorResponse::new(
                "INVALID_CREDIT_AMOUNT",
                format!("Credit amount must be between 1 and {}", max),
            ),
            ApiError::Rejected(rejection) => {
                let fallback = match rejection.reason {
                    RejectionReason::InsufficientCredits => "Insufficient credits",
                    RejectionReason::UserBanned => "User account is banned",
                    RejectionReason::UserNotFound => "User not found",
                    RejectionReason::Other(_) => "Credit consumption failed",
                };
                let message = rejection
                    .message
                    .clone()
                    .unwrap_or_else(|| fallback.to_string());
                ErrorResponse {
                    required_credits: rejection.required_credits,
                    available_credits: rejection.available_credits,
                    event_id: rejection.event_id,
                    ..ErrorResponse::new(rejection.reason.code(), message)
                }
            }
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                ErrorResponse::new("DATABASE_ERROR", "An internal database error occurred")
            }
            ApiError::Internal(ref e) => {
                tracing::error!("Internal error: {:?}", e);
                ErrorResponse {
                    details: expose_details.then(|| format!("{:#}", e)),
                    ..ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred")
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with_details(false)
    }
}

// Helper type for results
pub type Result<T> = std::result::Result<T, ApiError>;

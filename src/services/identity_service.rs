//! Bearer credential verification against the external identity provider
//!
//! The provider owns user accounts; this service only asks it who a token
//! belongs to. Tokens are never logged.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const BEARER_PREFIX: &str = "Bearer ";

/// Identity resolved from a verified bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential verification failed: {0}")]
    VerificationFailed(String),
}

impl AuthError {
    /// Message safe to return to the caller
    pub fn client_message(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "Missing or invalid Authorization header",
            AuthError::InvalidCredential(_) => "Invalid or expired token",
            AuthError::VerificationFailed(_) => "Unable to verify token",
        }
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolve a raw bearer token (without the scheme prefix) to a user
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}

/// Extract the token from an `Authorization` header value
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let token = authorization
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(AuthError::MissingCredential)?;

    if token.trim().is_empty() {
        return Err(AuthError::MissingCredential);
    }

    Ok(token)
}

/// Authenticate a request from its raw `Authorization` header
pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    authorization: Option<&str>,
) -> Result<AuthenticatedUser, AuthError> {
    let token = bearer_token(authorization)?;
    verifier.verify_token(token).await
}

/// User object returned by `GET /auth/v1/user`
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// Verifies tokens by asking the provider's user endpoint
pub struct RemoteIdentityVerifier {
    client: reqwest::Client,
    user_url: String,
    api_key: String,
}

impl RemoteIdentityVerifier {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            user_url: format!("{}/auth/v1/user", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for RemoteIdentityVerifier {
    #[instrument(skip_all)]
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let response = self
            .client
            .get(&self.user_url)
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("{}{}", BEARER_PREFIX, token))
            .send()
            .await
            .map_err(|e| {
                warn!("Identity provider request failed: {}", e);
                AuthError::VerificationFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            debug!("Identity provider rejected token with status {}", status);
            return Err(AuthError::InvalidCredential(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => "token rejected".to_string(),
                other => format!("provider returned {}", other),
            }));
        }

        let user: ProviderUser = response.json().await.map_err(|e| {
            warn!("Identity provider returned an unreadable user: {}", e);
            AuthError::InvalidCredential("no user in provider response".to_string())
        })?;

        Ok(AuthenticatedUser {
            id: user.id,
            email: user.email,
            role: user.role,
        })
    }
}

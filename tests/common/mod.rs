#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use pixelift::{
    config::{
        ApplicationConfig, Config, CreditsConfig, DatabaseConfig, Environment, IdentityConfig,
        LogFormat, ServerConfig,
    },
    create_router,
    models::ledger::{CreditConsumptionResult, LedgerOutcome},
    services::{
        identity_service::{AuthError, AuthenticatedUser},
        ledger_service::{CreditDebit, LedgerError},
        CreditLedger, IdentityVerifier,
    },
    AppState,
};
use serde_json::{json, Value};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const VALID_TOKEN: &str = "valid-token";
pub const BANNED_TOKEN: &str = "banned-token";
pub const PROVIDER_DOWN_TOKEN: &str = "provider-down";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_body_bytes: 1024 * 1024,
        },
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
        },
        identity: IdentityConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "test-anon-key".to_string(),
            timeout_ms: 1_000,
        },
        credits: CreditsConfig { max_amount: 10 },
        application: ApplicationConfig {
            environment: Environment::Development,
            log_format: LogFormat::Text,
        },
    }
}

/// Identity provider double keyed by token
pub struct StaticIdentityVerifier {
    users: HashMap<String, AuthenticatedUser>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self {
            users: HashMap::new(),
        }
    }

    pub fn with_user(mut self, token: &str, user: AuthenticatedUser) -> Self {
        self.users.insert(token.to_string(), user);
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        if token == PROVIDER_DOWN_TOKEN {
            return Err(AuthError::VerificationFailed("connection refused".to_string()));
        }
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| AuthError::InvalidCredential("unknown token".to_string()))
    }
}

pub fn user(email: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
        role: Some("authenticated".to_string()),
    }
}

/// Balance-keeping ledger that mirrors the procedure's contract
pub struct InMemoryLedger {
    balances: Mutex<HashMap<Uuid, i32>>,
    banned: HashSet<Uuid>,
    calls: Mutex<Vec<CreditDebit>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            banned: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_balance(self, user_id: Uuid, credits: i32) -> Self {
        self.balances.lock().unwrap().insert(user_id, credits);
        self
    }

    pub fn with_banned(mut self, user_id: Uuid) -> Self {
        self.banned.insert(user_id);
        self
    }

    pub fn balance(&self, user_id: Uuid) -> i32 {
        self.balances
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<CreditDebit> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditLedger for InMemoryLedger {
    async fn consume(&self, debit: CreditDebit) -> Result<LedgerOutcome, LedgerError> {
        self.calls.lock().unwrap().push(debit.clone());

        let event_id = Some(json!(Uuid::new_v4()));
        let amount = debit.credit_amount;

        let result = if self.banned.contains(&debit.user_id) {
            CreditConsumptionResult {
                success: false,
                error_code: Some("USER_BANNED".to_string()),
                event_id,
                ..Default::default()
            }
        } else {
            let mut balances = self.balances.lock().unwrap();
            let balance = balances.entry(debit.user_id).or_insert(0);
            if *balance < amount {
                CreditConsumptionResult {
                    success: false,
                    error_code: Some("INSUFFICIENT_CREDITS".to_string()),
                    required_credits: Some(amount),
                    available_credits: Some(*balance),
                    event_id,
                    ..Default::default()
                }
            } else {
                *balance -= amount;
                CreditConsumptionResult {
                    success: true,
                    credits_consumed: Some(amount),
                    remaining_credits: Some(*balance),
                    user_type: Some("standard".to_string()),
                    event_id,
                    warning: (*balance <= 1).then(|| "Credits are running low".to_string()),
                    warning_code: (*balance <= 1).then(|| "LOW_CREDITS".to_string()),
                    ..Default::default()
                }
            }
        };

        Ok(result.into_outcome(amount))
    }
}

/// Ledger double that returns one canned reply for every call
pub struct ScriptedLedger {
    reply: Box<dyn Fn() -> Result<CreditConsumptionResult, LedgerError> + Send + Sync>,
    calls: Mutex<Vec<CreditDebit>>,
}

impl ScriptedLedger {
    pub fn returning(result: CreditConsumptionResult) -> Self {
        Self {
            reply: Box::new(move || Ok(result.clone())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            reply: Box::new(|| {
                Err(LedgerError::Unavailable(sea_orm::DbErr::Custom(
                    "connection refused".to_string(),
                )))
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies with a raw procedure result, parsed the way the Postgres ledger parses it
    pub fn returning_json(raw: Value) -> Self {
        Self {
            reply: Box::new(move || {
                CreditConsumptionResult::from_json(raw.clone())
                    .map_err(LedgerError::MalformedResponse)
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CreditDebit> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditLedger for ScriptedLedger {
    async fn consume(&self, debit: CreditDebit) -> Result<LedgerOutcome, LedgerError> {
        let amount = debit.credit_amount;
        self.calls.lock().unwrap().push(debit);
        Ok((self.reply)()?.into_outcome(amount))
    }
}

/// Ledger double that commits every debit after a delay
pub struct SlowLedger {
    delay: Duration,
    calls: Mutex<Vec<CreditDebit>>,
}

impl SlowLedger {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<CreditDebit> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditLedger for SlowLedger {
    async fn consume(&self, debit: CreditDebit) -> Result<LedgerOutcome, LedgerError> {
        let amount = debit.credit_amount;
        self.calls.lock().unwrap().push(debit);
        tokio::time::sleep(self.delay).await;
        Ok(CreditConsumptionResult {
            success: true,
            credits_consumed: Some(amount),
            remaining_credits: Some(0),
            event_id: Some(json!("slow-commit")),
            ..Default::default()
        }
        .into_outcome(amount))
    }
}

/// Identity provider double that answers after a delay
pub struct SlowIdentityVerifier {
    delay: Duration,
    user: AuthenticatedUser,
}

impl SlowIdentityVerifier {
    pub fn new(delay: Duration, user: AuthenticatedUser) -> Self {
        Self { delay, user }
    }
}

#[async_trait]
impl IdentityVerifier for SlowIdentityVerifier {
    async fn verify_token(&self, _token: &str) -> Result<AuthenticatedUser, AuthError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.user.clone())
    }
}

pub fn app_with(
    config: Config,
    identity: Arc<dyn IdentityVerifier>,
    ledger: Arc<dyn CreditLedger>,
) -> Router {
    create_router(AppState::from_parts(config, identity, ledger))
}

pub fn consume_request(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/usage/consume")
        .header("content-type", "application/json")
        .header("user-agent", "pixelift-tests/1.0")
        .header("x-forwarded-for", "203.0.113.9");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Send one request; the body is `Value::Null` when empty
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

use crate::{
    config::Config,
    services::{
        CreditLedger, IdentityVerifier, PostgresCreditLedger, RemoteIdentityVerifier,
        UsageService,
    },
};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub usage_service: Arc<UsageService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let db = sea_orm::Database::connect(&config.database.url).await?;

        // Initialize external collaborators
        let identity: Arc<dyn IdentityVerifier> =
            Arc::new(RemoteIdentityVerifier::new(&config.identity)?);
        let ledger: Arc<dyn CreditLedger> = Arc::new(PostgresCreditLedger::new(db));

        Ok(Self::from_parts(config, identity, ledger))
    }

    /// Build state around already-constructed collaborators
    pub fn from_parts(
        config: Config,
        identity: Arc<dyn IdentityVerifier>,
        ledger: Arc<dyn CreditLedger>,
    ) -> Self {
        let usage_service = Arc::new(UsageService::new(
            identity,
            ledger,
            &config.credits,
            Duration::from_millis(config.identity.timeout_ms),
        ));

        Self {
            usage_service,
            config: Arc::new(config),
        }
    }
}

// Service modules
pub mod identity_service;
pub mod ledger_service;
pub mod usage_service;

pub use identity_service::{IdentityVerifier, RemoteIdentityVerifier};
pub use ledger_service::{CreditLedger, PostgresCreditLedger};
pub use usage_service::UsageService;

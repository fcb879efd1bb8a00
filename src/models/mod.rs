pub mod common;
pub mod ledger;
pub mod service_type;
pub mod usage;

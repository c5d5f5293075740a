//! revreg - Revocation registry lifecycle manager
//!
//! Drives issuer-side revocation registries for anonymous credentials from
//! generation through ledger publication to retirement, and tracks the
//! credential revocations waiting to be published.

pub mod config;
pub mod error;
pub mod interfaces;
pub mod record;
pub mod registry;
pub mod services;
pub mod storage;
pub mod tails;
pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{Result, RevocationError};
pub use record::{IssuerRevRegRecord, RecordState};
pub use services::RegistryLifecycleManager;

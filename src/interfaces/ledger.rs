//! Ledger service interface.

use async_trait::async_trait;
use serde_json::Value;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by the ledger service.
///
/// A failed write means nothing was durably written.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger transaction rejected: {0}")]
    Rejected(String),

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Interface for publishing revocation registry transactions.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Write a revocation registry definition.
    async fn send_revoc_reg_def(&self, revoc_reg_def: &Value, issuer_did: &str) -> Result<()>;

    /// Write a revocation registry entry (initial accumulator or a delta).
    async fn send_revoc_reg_entry(
        &self,
        revoc_reg_id: &str,
        revoc_def_type: &str,
        revoc_reg_entry: &Value,
        issuer_did: &str,
    ) -> Result<()>;
}

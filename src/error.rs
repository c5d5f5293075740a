//! Error taxonomy for revocation registry operations.

use crate::interfaces::{AllocationError, IssuerError, LedgerError};
use crate::record::RecordState;
use crate::storage::StorageError;
use crate::tails::TailsError;

/// Result type for lifecycle operations.
pub type Result<T> = std::result::Result<T, RevocationError>;

/// Errors that can occur while driving a revocation registry.
///
/// `State`, `Issuer` and `Validation` are raised by this crate. Collaborator
/// failures (`Ledger`, `Storage`, `Tails`, `Allocation`) are surfaced unchanged
/// and never retried here.
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// Operation is not valid in the record's current state.
    #[error("Cannot {operation} revocation registry in state {state}: {reason}")]
    State {
        operation: &'static str,
        state: RecordState,
        reason: String,
    },

    /// A credential definition has no registry in the required role.
    #[error("No {wanted} revocation registry for credential definition {cred_def_id}")]
    NoRegistry {
        cred_def_id: String,
        wanted: &'static str,
    },

    /// The issuer failed to generate the registry.
    #[error("Revocation registry generation failed: {0}")]
    Issuer(#[from] IssuerError),

    /// Caller supplied malformed input.
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Tails file error: {0}")]
    Tails(#[from] TailsError),

    #[error("Index allocation error: {0}")]
    Allocation(#[from] AllocationError),
}

impl RevocationError {
    pub(crate) fn state(
        operation: &'static str,
        state: RecordState,
        reason: impl Into<String>,
    ) -> Self {
        RevocationError::State {
            operation,
            state,
            reason: reason.into(),
        }
    }

    /// True for precondition violations (workflow bugs).
    pub fn is_state_error(&self) -> bool {
        matches!(self, RevocationError::State { .. })
    }

    /// True when the issuer capability failed.
    pub fn is_issuer_error(&self) -> bool {
        matches!(self, RevocationError::Issuer(_))
    }

    /// True when input was rejected before any mutation.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, RevocationError::Validation(_))
    }
}

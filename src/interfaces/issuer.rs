//! Issuer capability interface.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for issuer operations.
pub type Result<T> = std::result::Result<T, IssuerError>;

/// Errors raised by the issuer capability.
#[derive(Debug, thiserror::Error)]
pub enum IssuerError {
    #[error("Issuer operation failed: {0}")]
    Failed(String),

    #[error("Issuer wallet error: {0}")]
    Wallet(String),

    #[error("Malformed issuer response: {0}")]
    MalformedResponse(String),
}

/// How credential slots in a new registry start out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssuanceType {
    /// Every index is considered issued up front; revocation flips it.
    #[default]
    #[serde(rename = "ISSUANCE_BY_DEFAULT")]
    ByDefault,
    /// Indices are issued one at a time, each issuance updates the accumulator.
    #[serde(rename = "ISSUANCE_ON_DEMAND")]
    OnDemand,
}

impl IssuanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceType::ByDefault => "ISSUANCE_BY_DEFAULT",
            IssuanceType::OnDemand => "ISSUANCE_ON_DEMAND",
        }
    }
}

/// Parameters handed to the issuer when creating a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Accumulator scheme tag, e.g. `CL_ACCUM`.
    pub revoc_def_type: String,
    /// Registry tag, unique per credential definition.
    pub tag: String,
    /// Maximum number of credentials the registry can hold.
    pub max_cred_num: u32,
    pub issuance_type: IssuanceType,
    /// Directory the issuer writes the tails file into.
    ///
    /// The file is expected at `{tails_dir}/{tails_hash}` once the call returns.
    pub tails_dir: PathBuf,
}

/// Output of a successful registry creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRegistry {
    pub revoc_reg_id: String,
    pub revoc_reg_def_json: String,
    pub revoc_reg_entry_json: String,
}

/// Interface for the issuer's cryptographic capability.
///
/// Implementations own the accumulator math, key material and wallet
/// storage. The lifecycle manager only orchestrates calls and never inspects
/// anything beyond the tails hash and location in the returned definition.
#[async_trait]
pub trait Issuer: Send + Sync {
    /// Create a revocation registry for a credential definition and store its
    /// private material in the issuer wallet.
    ///
    /// On success the tails file has been written to `config.tails_dir`.
    async fn create_and_store_revocation_registry(
        &self,
        origin_did: &str,
        cred_def_id: &str,
        config: &RegistryConfig,
    ) -> Result<CreatedRegistry>;

    /// Revoke a batch of credential indices, returning the registry delta to
    /// publish as a new entry.
    async fn revoke_credentials(
        &self,
        revoc_reg_id: &str,
        tails_local_path: &Path,
        cred_rev_ids: &[String],
    ) -> Result<String>;
}

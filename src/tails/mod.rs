//! Tails file handling.
//!
//! The tails file is the large auxiliary artifact behind every revocation
//! registry. This module covers where it lives locally, how it is moved into
//! place after generation, how it is hosted, and how public locations are
//! validated.
//!
//! ## Local Layout
//!
//! ```text
//! {client_dir}/tails/
//!   .hopper/{record_id}/{tails_hash}     # issuer output, transient
//!   {revoc_reg_id}/{tails_hash}          # canonical location
//! ```
//!
//! ## Integrity
//!
//! Tails hashes are base58-encoded SHA-256 digests of the file content.

mod config;
mod coordinator;
mod server;

pub use config::TailsConfig;
pub use coordinator::TailsCoordinator;
pub use server::HttpTailsServer;

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

use crate::error::RevocationError;

/// Errors that can occur while handling tails files.
#[derive(Debug, Error)]
pub enum TailsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tails file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid tails path component: {0:?}")]
    InvalidPathComponent(String),

    #[error("Tails file public URI is empty")]
    MissingPublicUri,

    #[error("Error retrieving tails file: {0}")]
    Download(String),

    #[error("Tails hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("Tails upload failed: {reason}")]
    Upload { reason: String },
}

/// Result type for tails operations.
pub type Result<T> = std::result::Result<T, TailsError>;

/// Incremental tails hash computation.
#[derive(Default)]
pub struct TailsHasher {
    inner: Sha256,
}

impl TailsHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Base58 digest, as found in `revocRegDef.value.tailsHash`.
    pub fn finish(self) -> String {
        bs58::encode(self.inner.finalize()).into_string()
    }
}

/// Compute the tails hash of an in-memory payload.
pub fn compute_tails_hash(content: &[u8]) -> String {
    let mut hasher = TailsHasher::new();
    hasher.update(content);
    hasher.finish()
}

/// Location of a registry's tails file on a tails server rooted at `base_url`.
pub fn hosted_uri(base_url: &str, revoc_reg_id: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), revoc_reg_id)
}

/// Check that a public tails location is an absolute `http`/`https` URL.
pub fn validate_public_uri(uri: &str) -> std::result::Result<Url, RevocationError> {
    let url = Url::parse(uri).map_err(|e| {
        RevocationError::Validation(format!(
            "tails public URI {uri:?} is not an absolute URL: {e}"
        ))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RevocationError::Validation(format!(
            "tails public URI {uri:?} must use http or https, not {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(RevocationError::Validation(format!(
            "tails public URI {uri:?} has no host"
        )));
    }

    Ok(url)
}

/// Reject identifiers that would not map to exactly one path component.
pub(crate) fn path_component(value: &str) -> Result<&str> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
    {
        return Err(TailsError::InvalidPathComponent(value.to_string()));
    }
    Ok(value)
}

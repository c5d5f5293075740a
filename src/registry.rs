//! Read-only accumulator view of a revocation registry definition.
//!
//! Holders and verifiers only need the definition's identifying fields and
//! the tails file. [`RevocationRegistry`] exposes those and can fetch and
//! verify the tails file from its public location.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Result, RevocationError};
use crate::tails::{self, TailsError, TailsHasher};

/// Accumulator view derived from a revocation registry definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationRegistry {
    registry_id: String,
    reg_def_type: String,
    cred_def_id: String,
    issuer_did: String,
    max_creds: u32,
    tag: String,
    tails_hash: String,
    tails_local_path: Option<PathBuf>,
    tails_public_uri: Option<String>,
}

impl RevocationRegistry {
    /// Build the view from a definition JSON.
    ///
    /// When `public_def` is set, `value.tailsLocation` is the public URI of
    /// the tails file; otherwise it is a local path.
    pub fn from_definition(def: &Value, public_def: bool) -> Result<Self> {
        let registry_id = required_str(def, &["id"])?;
        let issuer_did = registry_id
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string();
        let tails_location = def
            .pointer("/value/tailsLocation")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let max_creds = def
            .pointer("/value/maxCredNum")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| malformed("value.maxCredNum"))?;

        let (tails_local_path, tails_public_uri) = if public_def {
            (None, tails_location)
        } else {
            (tails_location.map(PathBuf::from), None)
        };

        Ok(Self {
            issuer_did,
            reg_def_type: required_str(def, &["revocDefType"])?,
            cred_def_id: required_str(def, &["credDefId"])?,
            tag: required_str(def, &["tag"])?,
            tails_hash: required_str(def, &["value", "tailsHash"])?,
            max_creds,
            tails_local_path,
            tails_public_uri,
            registry_id,
        })
    }

    pub fn registry_id(&self) -> &str {
        &self.registry_id
    }

    pub fn reg_def_type(&self) -> &str {
        &self.reg_def_type
    }

    pub fn cred_def_id(&self) -> &str {
        &self.cred_def_id
    }

    /// DID that issued the registry, taken from the registry id.
    pub fn issuer_did(&self) -> &str {
        &self.issuer_did
    }

    pub fn max_creds(&self) -> u32 {
        self.max_creds
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn tails_hash(&self) -> &str {
        &self.tails_hash
    }

    pub fn tails_local_path(&self) -> Option<&Path> {
        self.tails_local_path.as_deref()
    }

    pub fn set_tails_local_path(&mut self, path: Option<PathBuf>) {
        self.tails_local_path = path;
    }

    pub fn tails_public_uri(&self) -> Option<&str> {
        self.tails_public_uri.as_deref()
    }

    pub fn set_tails_public_uri(&mut self, uri: Option<String>) {
        self.tails_public_uri = uri;
    }

    /// Where a downloaded tails file is placed under `dir`.
    pub fn receiving_tails_local_path(&self, dir: &Path) -> tails::Result<PathBuf> {
        Ok(dir
            .join(tails::path_component(&self.registry_id)?)
            .join(tails::path_component(&self.tails_hash)?))
    }

    /// Whether the tails file is present at the known local path.
    pub async fn has_local_tails_file(&self) -> bool {
        match &self.tails_local_path {
            Some(path) => fs::try_exists(path).await.unwrap_or(false),
            None => false,
        }
    }

    /// Download the tails file from its public URI into `dir`.
    ///
    /// The content is hashed while streaming and only moved into place when
    /// the digest matches the definition's tails hash. Returns the local path
    /// and records it on the view.
    pub async fn retrieve_tails(
        &mut self,
        dir: &Path,
        client: &reqwest::Client,
    ) -> tails::Result<PathBuf> {
        let uri = self
            .tails_public_uri
            .clone()
            .ok_or(TailsError::MissingPublicUri)?;
        let destination = self.receiving_tails_local_path(dir)?;
        let partial = destination.with_extension("download");

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut response = client
            .get(&uri)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| TailsError::Download(e.to_string()))?;

        let mut hasher = TailsHasher::new();
        let mut file = fs::File::create(&partial).await?;
        let streamed = async {
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| TailsError::Download(e.to_string()))?
            {
                hasher.update(&chunk);
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, TailsError>(())
        }
        .await;
        drop(file);

        if let Err(e) = streamed {
            remove_partial(&partial).await;
            return Err(e);
        }

        let actual = hasher.finish();
        if actual != self.tails_hash {
            remove_partial(&partial).await;
            return Err(TailsError::HashMismatch {
                expected: self.tails_hash.clone(),
                actual,
            });
        }

        fs::rename(&partial, &destination).await?;
        debug!(
            revoc_reg_id = %self.registry_id,
            path = %destination.display(),
            "Retrieved tails file"
        );
        self.tails_local_path = Some(destination.clone());
        Ok(destination)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove partial tails file");
    }
}

fn required_str(def: &Value, path: &[&str]) -> Result<String> {
    path.iter()
        .try_fold(def, |node, key| node.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(&path.join(".")))
}

fn malformed(field: &str) -> RevocationError {
    RevocationError::Validation(format!(
        "revocation registry definition is missing {field}"
    ))
}

//! Test utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits for
//! testing without a real issuer wallet, ledger or tails server.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::interfaces::{
    AllocationError, CreatedRegistry, IndexAllocation, Issuer, IssuerError, Ledger, LedgerError,
    RegistryConfig, TailsServer,
};
use crate::tails::{self, TailsError};

/// Mock issuer that writes a small deterministic tails file.
#[derive(Default)]
pub struct MockIssuer {
    fail_on_create: RwLock<bool>,
    fail_after_tails_write: RwLock<bool>,
    malformed_definition: RwLock<bool>,
    fail_on_revoke: RwLock<bool>,
    created: RwLock<Vec<String>>,
    revoked: RwLock<Vec<(String, Vec<String>)>>,
}

impl MockIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_create(&self, fail: bool) {
        *self.fail_on_create.write().await = fail;
    }

    /// Write the tails file into the hopper, then report failure.
    pub async fn set_fail_after_tails_write(&self, fail: bool) {
        *self.fail_after_tails_write.write().await = fail;
    }

    /// Return a definition without `value.tailsHash`.
    pub async fn set_malformed_definition(&self, malformed: bool) {
        *self.malformed_definition.write().await = malformed;
    }

    pub async fn set_fail_on_revoke(&self, fail: bool) {
        *self.fail_on_revoke.write().await = fail;
    }

    /// Registry ids created so far, in call order.
    pub async fn created(&self) -> Vec<String> {
        self.created.read().await.clone()
    }

    /// `(revoc_reg_id, cred_rev_ids)` of every revoke call.
    pub async fn revoked(&self) -> Vec<(String, Vec<String>)> {
        self.revoked.read().await.clone()
    }
}

#[async_trait]
impl Issuer for MockIssuer {
    async fn create_and_store_revocation_registry(
        &self,
        origin_did: &str,
        cred_def_id: &str,
        config: &RegistryConfig,
    ) -> Result<CreatedRegistry, IssuerError> {
        if *self.fail_on_create.read().await {
            return Err(IssuerError::Failed("Not this time".to_string()));
        }

        let revoc_reg_id = format!(
            "{origin_did}:4:{cred_def_id}:{}:{}",
            config.revoc_def_type, config.tag
        );
        let content = format!("tails for {revoc_reg_id}");
        let tails_hash = tails::compute_tails_hash(content.as_bytes());
        let tails_path = config.tails_dir.join(&tails_hash);
        tokio::fs::write(&tails_path, content)
            .await
            .map_err(|e| IssuerError::Wallet(e.to_string()))?;

        if *self.fail_after_tails_write.read().await {
            return Err(IssuerError::Failed("wallet closed mid-generation".to_string()));
        }

        let mut value = json!({
            "issuanceType": config.issuance_type.as_str(),
            "maxCredNum": config.max_cred_num,
            "publicKeys": {"accumKey": {"z": "1 0000"}},
            "tailsLocation": tails_path.display().to_string(),
        });
        if !*self.malformed_definition.read().await {
            value["tailsHash"] = Value::String(tails_hash);
        }
        let revoc_reg_def = json!({
            "ver": "1.0",
            "id": revoc_reg_id,
            "revocDefType": config.revoc_def_type,
            "tag": config.tag,
            "credDefId": cred_def_id,
            "value": value,
        });
        let revoc_reg_entry = json!({"ver": "1.0", "value": {"accum": "21 0000"}});

        self.created.write().await.push(revoc_reg_id.clone());
        Ok(CreatedRegistry {
            revoc_reg_id,
            revoc_reg_def_json: revoc_reg_def.to_string(),
            revoc_reg_entry_json: revoc_reg_entry.to_string(),
        })
    }

    async fn revoke_credentials(
        &self,
        revoc_reg_id: &str,
        _tails_local_path: &Path,
        cred_rev_ids: &[String],
    ) -> Result<String, IssuerError> {
        if *self.fail_on_revoke.read().await {
            return Err(IssuerError::Failed("revocation failed".to_string()));
        }
        self.revoked
            .write()
            .await
            .push((revoc_reg_id.to_string(), cred_rev_ids.to_vec()));
        Ok(json!({"ver": "1.0", "value": {"revoked": cred_rev_ids}}).to_string())
    }
}

/// A revocation registry entry as the mock ledger received it.
#[derive(Debug, Clone, PartialEq)]
pub struct SentEntry {
    pub revoc_reg_id: String,
    pub revoc_def_type: String,
    pub entry: Value,
    pub issuer_did: String,
}

/// Mock ledger that records every write.
#[derive(Default)]
pub struct MockLedger {
    definitions: RwLock<Vec<(Value, String)>>,
    entries: RwLock<Vec<SentEntry>>,
    fail_on_def: RwLock<bool>,
    fail_on_entry: RwLock<bool>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_def(&self, fail: bool) {
        *self.fail_on_def.write().await = fail;
    }

    pub async fn set_fail_on_entry(&self, fail: bool) {
        *self.fail_on_entry.write().await = fail;
    }

    pub async fn definitions(&self) -> Vec<(Value, String)> {
        self.definitions.read().await.clone()
    }

    pub async fn entries(&self) -> Vec<SentEntry> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn send_revoc_reg_def(
        &self,
        revoc_reg_def: &Value,
        issuer_did: &str,
    ) -> Result<(), LedgerError> {
        if *self.fail_on_def.read().await {
            return Err(LedgerError::Unavailable("pool timeout".to_string()));
        }
        self.definitions
            .write()
            .await
            .push((revoc_reg_def.clone(), issuer_did.to_string()));
        Ok(())
    }

    async fn send_revoc_reg_entry(
        &self,
        revoc_reg_id: &str,
        revoc_def_type: &str,
        revoc_reg_entry: &Value,
        issuer_did: &str,
    ) -> Result<(), LedgerError> {
        if *self.fail_on_entry.read().await {
            return Err(LedgerError::Rejected("entry rejected".to_string()));
        }
        self.entries.write().await.push(SentEntry {
            revoc_reg_id: revoc_reg_id.to_string(),
            revoc_def_type: revoc_def_type.to_string(),
            entry: revoc_reg_entry.clone(),
            issuer_did: issuer_did.to_string(),
        });
        Ok(())
    }
}

/// Mock index allocation with settable occupied counts.
#[derive(Default)]
pub struct MockIndexAllocation {
    occupied: RwLock<HashMap<String, u32>>,
}

impl MockIndexAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_occupied(&self, revoc_reg_id: &str, occupied: u32) {
        self.occupied
            .write()
            .await
            .insert(revoc_reg_id.to_string(), occupied);
    }
}

#[async_trait]
impl IndexAllocation for MockIndexAllocation {
    async fn occupied_count(&self, revoc_reg_id: &str) -> Result<u32, AllocationError> {
        self.occupied
            .read()
            .await
            .get(revoc_reg_id)
            .copied()
            .ok_or_else(|| AllocationError::UnknownRegistry(revoc_reg_id.to_string()))
    }
}

/// Mock tails server that can fail a number of uploads before succeeding.
#[derive(Default)]
pub struct MockTailsServer {
    uploads: RwLock<Vec<(String, PathBuf)>>,
    attempts: RwLock<usize>,
    failures_remaining: RwLock<usize>,
}

impl MockTailsServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` uploads with a server error.
    pub async fn fail_next(&self, count: usize) {
        *self.failures_remaining.write().await = count;
    }

    pub async fn uploads(&self) -> Vec<(String, PathBuf)> {
        self.uploads.read().await.clone()
    }

    pub async fn attempts(&self) -> usize {
        *self.attempts.read().await
    }
}

#[async_trait]
impl TailsServer for MockTailsServer {
    async fn upload_tails_file(
        &self,
        revoc_reg_id: &str,
        tails_file_path: &Path,
    ) -> Result<(), TailsError> {
        *self.attempts.write().await += 1;
        {
            let mut remaining = self.failures_remaining.write().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TailsError::Upload {
                    reason: "500 Internal Server Error".to_string(),
                });
            }
        }
        if !tails_file_path.exists() {
            return Err(TailsError::NotFound(tails_file_path.to_path_buf()));
        }
        self.uploads
            .write()
            .await
            .push((revoc_reg_id.to_string(), tails_file_path.to_path_buf()));
        Ok(())
    }
}

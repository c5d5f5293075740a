//! Issuer revocation registry record.
//!
//! The record is the unit of persistence for one registry. Its fields are
//! only mutated through the methods here, which enforce the forward-only
//! state machine, write-once fields, and uniqueness of pending tokens. The
//! lifecycle manager is the only caller of the mutating methods.

mod state;

pub use state::{RecordState, Transition};

use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, RevocationError};
use crate::interfaces::IssuanceType;
use crate::registry::RevocationRegistry;
use crate::storage::StorageError;
use crate::tails;

/// Default accumulator scheme.
pub const DEFAULT_REVOC_DEF_TYPE: &str = "CL_ACCUM";
/// Default registry capacity.
pub const DEFAULT_MAX_CRED_NUM: u32 = 1000;

/// Store-assigned creation order of a record.
///
/// Zero means "not yet persisted".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    pub const UNASSIGNED: SequenceId = SequenceId(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry parameters chosen at record creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryOptions {
    pub revoc_def_type: String,
    pub max_cred_num: u32,
    pub issuance_type: IssuanceType,
    /// Registry tag; defaults to the record id.
    pub tag: Option<String>,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            revoc_def_type: DEFAULT_REVOC_DEF_TYPE.to_string(),
            max_cred_num: DEFAULT_MAX_CRED_NUM,
            issuance_type: IssuanceType::default(),
            tag: None,
        }
    }
}

/// Everything generation produces, applied to a record in one step.
#[derive(Debug, Clone)]
pub(crate) struct GeneratedRegistry {
    pub revoc_reg_id: String,
    pub revoc_reg_def: Value,
    pub revoc_reg_entry: Value,
    pub tails_hash: String,
    pub tails_local_path: PathBuf,
}

/// Issuer-side record of one revocation registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuerRevRegRecord {
    record_id: Uuid,
    #[serde(default)]
    sequence_id: SequenceId,
    state: RecordState,
    issuer_did: Option<String>,
    cred_def_id: Option<String>,
    revoc_reg_id: Option<String>,
    revoc_def_type: String,
    tag: String,
    max_cred_num: u32,
    #[serde(default)]
    issuance_type: IssuanceType,
    revoc_reg_def: Option<Value>,
    revoc_reg_entry: Option<Value>,
    tails_hash: Option<String>,
    tails_local_path: Option<PathBuf>,
    tails_public_uri: Option<String>,
    #[serde(default)]
    pending_pub: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IssuerRevRegRecord {
    /// Create a new record in `Init` for a credential definition.
    pub fn new(
        issuer_did: impl Into<String>,
        cred_def_id: impl Into<String>,
        options: RegistryOptions,
    ) -> Self {
        let mut record = Self::blank(options);
        record.issuer_did = Some(issuer_did.into());
        record.cred_def_id = Some(cred_def_id.into());
        record
    }

    /// Create a record with no issuer or credential definition attached.
    ///
    /// Such a record can track pending tokens but cannot be generated.
    pub fn blank(options: RegistryOptions) -> Self {
        let record_id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            record_id,
            sequence_id: SequenceId::UNASSIGNED,
            state: RecordState::Init,
            issuer_did: None,
            cred_def_id: None,
            revoc_reg_id: None,
            revoc_def_type: options.revoc_def_type,
            tag: options.tag.unwrap_or_else(|| record_id.to_string()),
            max_cred_num: options.max_cred_num,
            issuance_type: options.issuance_type,
            revoc_reg_def: None,
            revoc_reg_entry: None,
            tails_hash: None,
            tails_local_path: None,
            tails_public_uri: None,
            pending_pub: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_id(&self) -> Uuid {
        self.record_id
    }

    pub fn sequence_id(&self) -> SequenceId {
        self.sequence_id
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn issuer_did(&self) -> Option<&str> {
        self.issuer_did.as_deref()
    }

    pub fn cred_def_id(&self) -> Option<&str> {
        self.cred_def_id.as_deref()
    }

    pub fn revoc_reg_id(&self) -> Option<&str> {
        self.revoc_reg_id.as_deref()
    }

    pub fn revoc_def_type(&self) -> &str {
        &self.revoc_def_type
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn max_cred_num(&self) -> u32 {
        self.max_cred_num
    }

    pub fn issuance_type(&self) -> IssuanceType {
        self.issuance_type
    }

    pub fn revoc_reg_def(&self) -> Option<&Value> {
        self.revoc_reg_def.as_ref()
    }

    pub fn revoc_reg_entry(&self) -> Option<&Value> {
        self.revoc_reg_entry.as_ref()
    }

    pub fn tails_hash(&self) -> Option<&str> {
        self.tails_hash.as_deref()
    }

    pub fn tails_local_path(&self) -> Option<&Path> {
        self.tails_local_path.as_deref()
    }

    pub fn tails_public_uri(&self) -> Option<&str> {
        self.tails_public_uri.as_deref()
    }

    pub fn pending_pub(&self) -> &[String] {
        &self.pending_pub
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_pub.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Record the store-assigned sequence id.
    ///
    /// Called by `RecordStore` implementations on insert and load. An id that
    /// is already assigned can only be re-applied with the same value.
    pub fn assign_sequence_id(
        &mut self,
        sequence_id: SequenceId,
    ) -> std::result::Result<(), StorageError> {
        if self.sequence_id.is_assigned() && self.sequence_id != sequence_id {
            return Err(StorageError::SequenceReassigned {
                record_id: self.record_id,
                current: self.sequence_id.value(),
                requested: sequence_id.value(),
            });
        }
        self.sequence_id = sequence_id;
        Ok(())
    }

    /// Fail unless `transition` may start from the current state.
    pub fn ensure(&self, transition: Transition) -> Result<()> {
        if self.state != transition.source() {
            return Err(RevocationError::state(
                transition.name(),
                self.state,
                format!("expected state {}", transition.source()),
            ));
        }
        Ok(())
    }

    /// Apply the output of a successful generation and move to `Generated`.
    pub(crate) fn apply_generated(&mut self, generated: GeneratedRegistry) -> Result<()> {
        self.ensure(Transition::Generate)?;

        if let Some(existing) = &self.revoc_reg_id {
            if existing != &generated.revoc_reg_id {
                return Err(RevocationError::state(
                    Transition::Generate.name(),
                    self.state,
                    format!(
                        "revoc_reg_id is write-once: record has {existing}, issuer returned {}",
                        generated.revoc_reg_id
                    ),
                ));
            }
        }
        if self.tails_hash.is_some() || self.revoc_reg_entry.is_some() {
            return Err(RevocationError::state(
                Transition::Generate.name(),
                self.state,
                "tails hash and registry entry are already set",
            ));
        }

        self.revoc_reg_id = Some(generated.revoc_reg_id);
        self.revoc_reg_def = Some(generated.revoc_reg_def);
        self.revoc_reg_entry = Some(generated.revoc_reg_entry);
        self.tails_hash = Some(generated.tails_hash);
        self.tails_local_path = Some(generated.tails_local_path);
        self.move_to(Transition::Generate);
        Ok(())
    }

    /// Advance a publication or retirement step.
    pub(crate) fn advance(&mut self, transition: Transition) -> Result<()> {
        debug_assert!(transition != Transition::Generate);
        self.ensure(transition)?;
        self.move_to(transition);
        Ok(())
    }

    fn move_to(&mut self, transition: Transition) {
        self.state = transition.target();
        self.touch();
    }

    /// Store the public tails URI and point the definition at it.
    pub(crate) fn set_tails_public_uri(&mut self, uri: &str) -> Result<()> {
        const OPERATION: &str = "set tails public URI for";

        if !matches!(
            self.state,
            RecordState::Generated | RecordState::Posted | RecordState::Active
        ) {
            let reason = if self.state.has_definition() {
                "registry is retired"
            } else {
                "revocation registry definition is not yet generated"
            };
            return Err(RevocationError::state(OPERATION, self.state, reason));
        }

        tails::validate_public_uri(uri)?;

        let state = self.state;
        let value = self
            .revoc_reg_def
            .as_mut()
            .and_then(|def| def.get_mut("value"))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                RevocationError::state(
                    OPERATION,
                    state,
                    "revocation registry definition has no value section",
                )
            })?;
        value.insert("tailsLocation".to_string(), Value::String(uri.to_string()));
        self.tails_public_uri = Some(uri.to_string());
        self.touch();
        Ok(())
    }

    /// Add a token to the pending set. Returns false if it was already present.
    pub(crate) fn mark_pending(&mut self, token: &str) -> Result<bool> {
        if self.state == RecordState::Full {
            return Err(RevocationError::state(
                "mark pending revocation on",
                self.state,
                "registry is full",
            ));
        }
        if self.pending_pub.iter().any(|t| t == token) {
            return Ok(false);
        }
        self.pending_pub.push(token.to_string());
        self.touch();
        Ok(true)
    }

    /// Remove the given tokens, or every token when `tokens` is empty.
    ///
    /// Returns how many tokens were removed.
    pub(crate) fn clear_pending(&mut self, tokens: &[String]) -> usize {
        let before = self.pending_pub.len();
        if tokens.is_empty() {
            self.pending_pub.clear();
        } else {
            self.pending_pub.retain(|t| !tokens.contains(t));
        }
        let removed = before - self.pending_pub.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    /// Read-only accumulator view built from the definition.
    pub fn registry(&self) -> Result<RevocationRegistry> {
        let def = self.revoc_reg_def.as_ref().ok_or_else(|| {
            RevocationError::state(
                "build registry view for",
                self.state,
                "revocation registry definition is not yet generated",
            )
        })?;
        let mut registry = RevocationRegistry::from_definition(def, true)?;
        registry.set_tails_local_path(self.tails_local_path.clone());
        registry.set_tails_public_uri(self.tails_public_uri.clone());
        Ok(registry)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Records order by store-assigned sequence id.
///
/// Two distinct records sharing a sequence id (e.g. both unpersisted) are
/// incomparable.
impl PartialOrd for IssuerRevRegRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.sequence_id.cmp(&other.sequence_id) {
            Ordering::Equal if self != other => None,
            ordering => Some(ordering),
        }
    }
}

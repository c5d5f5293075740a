//! Registry lifecycle manager.
//!
//! Drives issuer revocation registry records through
//! `Init -> Generated -> Posted -> Active -> Full`, calling the issuer and
//! ledger at each step and persisting the record only after the collaborator
//! call succeeded.
//!
//! ## Locking
//!
//! State transitions for a credential definition are serialized through a
//! per-cred-def mutex. Every read-modify-write of a record additionally holds
//! a per-record mutex. Locks are always taken cred-def first, then record.
//! Records without a credential definition use `record:{record_id}` as their
//! cred-def key.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RegistryDefaults;
use crate::error::{Result, RevocationError};
use crate::interfaces::{
    AtMaxCredNum, CapacityPredicate, CreatedRegistry, IndexAllocation, Issuer, IssuerError,
    Ledger, RegistryConfig,
};
use crate::record::{
    GeneratedRegistry, IssuerRevRegRecord, RecordState, RegistryOptions, Transition,
};
use crate::registry::RevocationRegistry;
use crate::services::{KeyedLocks, RecordCache, RecordQueryService};
use crate::storage::RecordStore;
use crate::tails::{TailsConfig, TailsCoordinator};

/// Outcome of a capacity check on an active registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityStatus {
    /// The registry can take more credentials.
    Available { occupied: u32, max_cred_num: u32 },
    /// The registry is (now) full.
    Full,
}

/// Pending revocations published for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPublication {
    pub record_id: Uuid,
    pub revoc_reg_id: String,
    /// Tokens included in the published delta, now cleared from the record.
    pub published: Vec<String>,
}

/// Result of a crash-recovery pass over records with pending revocations.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub published: Vec<PendingPublication>,
    /// Records whose registry is not yet active; their tokens stay pending.
    pub skipped: Vec<Uuid>,
    pub failed: Vec<(Uuid, RevocationError)>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Orchestrates generation, publication and retirement of revocation registries.
pub struct RegistryLifecycleManager {
    store: Arc<dyn RecordStore>,
    issuer: Arc<dyn Issuer>,
    ledger: Arc<dyn Ledger>,
    allocation: Arc<dyn IndexAllocation>,
    capacity: Arc<dyn CapacityPredicate>,
    tails: TailsCoordinator,
    tails_config: TailsConfig,
    defaults: RegistryDefaults,
    cache: Arc<RecordCache>,
    queries: RecordQueryService,
    cred_def_locks: KeyedLocks,
    record_locks: KeyedLocks,
}

impl RegistryLifecycleManager {
    pub fn new(
        store: Arc<dyn RecordStore>,
        issuer: Arc<dyn Issuer>,
        ledger: Arc<dyn Ledger>,
        allocation: Arc<dyn IndexAllocation>,
        tails_config: TailsConfig,
        cache: Arc<RecordCache>,
    ) -> Self {
        Self {
            queries: RecordQueryService::new(store.clone()),
            tails: TailsCoordinator::new(tails_config.client_dir.clone()),
            store,
            issuer,
            ledger,
            allocation,
            capacity: Arc::new(AtMaxCredNum),
            tails_config,
            defaults: RegistryDefaults::default(),
            cache,
            cred_def_locks: KeyedLocks::new(),
            record_locks: KeyedLocks::new(),
        }
    }

    /// Use these defaults for records created without explicit options.
    pub fn with_defaults(mut self, defaults: RegistryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replace the default `occupied >= max_cred_num` capacity rule.
    pub fn with_capacity_predicate(mut self, capacity: Arc<dyn CapacityPredicate>) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn queries(&self) -> &RecordQueryService {
        &self.queries
    }

    pub fn tails(&self) -> &TailsCoordinator {
        &self.tails
    }

    // ------------------------------------------------------------------
    // Record access
    // ------------------------------------------------------------------

    /// Create and persist a new `Init` record with the configured defaults.
    pub async fn create_record(
        &self,
        issuer_did: &str,
        cred_def_id: &str,
    ) -> Result<IssuerRevRegRecord> {
        self.create_record_with(issuer_did, cred_def_id, self.defaults.options())
            .await
    }

    /// Create and persist a new `Init` record.
    pub async fn create_record_with(
        &self,
        issuer_did: &str,
        cred_def_id: &str,
        options: RegistryOptions,
    ) -> Result<IssuerRevRegRecord> {
        let record = IssuerRevRegRecord::new(issuer_did, cred_def_id, options);
        let record = self.store.insert(record).await?;
        self.cache.put(&record).await;
        info!(
            record_id = %record.record_id(),
            sequence_id = %record.sequence_id(),
            cred_def_id,
            "Created revocation registry record"
        );
        Ok(record)
    }

    /// Current version of a record.
    pub async fn record(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        self.load(record_id).await
    }

    /// Read-only accumulator view of a generated record.
    pub async fn get_registry(&self, record_id: Uuid) -> Result<RevocationRegistry> {
        self.load(record_id).await?.registry()
    }

    async fn load(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        if let Some(record) = self.cache.get(record_id).await {
            return Ok(record);
        }
        let record = self.store.get(record_id).await?;
        self.cache.put(&record).await;
        Ok(record)
    }

    /// Write a record to the store, then the cache.
    ///
    /// On failure the cached copy is dropped so the next read reloads the
    /// store's version.
    async fn persist(&self, record: &IssuerRevRegRecord) -> Result<()> {
        if let Err(e) = self.store.update(record).await {
            self.cache.invalidate(record.record_id()).await;
            return Err(e.into());
        }
        self.cache.put(record).await;
        Ok(())
    }

    async fn lock_cred_def_of(&self, record_id: Uuid) -> Result<OwnedMutexGuard<()>> {
        let record = self.load(record_id).await?;
        let key = match record.cred_def_id() {
            Some(cred_def_id) => cred_def_id.to_string(),
            None => format!("record:{record_id}"),
        };
        Ok(self.cred_def_locks.lock(&key).await)
    }

    async fn lock_record(&self, record_id: Uuid) -> OwnedMutexGuard<()> {
        self.record_locks.lock(&record_id.to_string()).await
    }

    // ------------------------------------------------------------------
    // State transitions
    // ------------------------------------------------------------------

    /// Create the registry with the issuer and stage its tails file.
    ///
    /// On issuer failure the record stays in `Init` and anything written to
    /// the hopper is discarded.
    #[tracing::instrument(name = "revreg.generate", skip_all, fields(%record_id))]
    pub async fn generate(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _cred_def = self.lock_cred_def_of(record_id).await?;
        self.generate_locked(record_id).await
    }

    async fn generate_locked(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        record.ensure(Transition::Generate)?;

        let (Some(issuer_did), Some(cred_def_id)) = (
            record.issuer_did().map(str::to_string),
            record.cred_def_id().map(str::to_string),
        ) else {
            return Err(RevocationError::state(
                Transition::Generate.name(),
                record.state(),
                "record has no issuer or credential definition",
            ));
        };

        let config = RegistryConfig {
            revoc_def_type: record.revoc_def_type().to_string(),
            tag: record.tag().to_string(),
            max_cred_num: record.max_cred_num(),
            issuance_type: record.issuance_type(),
            tails_dir: self.tails.prepare_hopper(record_id).await?,
        };

        let created = match self
            .issuer
            .create_and_store_revocation_registry(&issuer_did, &cred_def_id, &config)
            .await
        {
            Ok(created) => created,
            Err(e) => {
                warn!(
                    %record_id,
                    %cred_def_id,
                    error = %e,
                    "Revocation registry generation failed"
                );
                self.tails.discard_hopper(record_id).await;
                return Err(e.into());
            }
        };

        let generated = match self.stage_generated(record_id, created).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!(%record_id, error = %e, "Discarding generated registry");
                self.tails.discard_hopper(record_id).await;
                return Err(e);
            }
        };

        record.apply_generated(generated)?;
        self.persist(&record).await?;

        info!(
            %record_id,
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            %cred_def_id,
            state = %record.state(),
            "Generated revocation registry"
        );
        Ok(record)
    }

    /// Parse issuer output and move the tails file to its canonical path.
    async fn stage_generated(
        &self,
        record_id: Uuid,
        created: CreatedRegistry,
    ) -> Result<GeneratedRegistry> {
        let mut revoc_reg_def: Value =
            serde_json::from_str(&created.revoc_reg_def_json).map_err(|e| {
                IssuerError::MalformedResponse(format!("revocation registry definition: {e}"))
            })?;
        let revoc_reg_entry: Value =
            serde_json::from_str(&created.revoc_reg_entry_json).map_err(|e| {
                IssuerError::MalformedResponse(format!("revocation registry entry: {e}"))
            })?;
        let tails_hash = revoc_reg_def
            .pointer("/value/tailsHash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                IssuerError::MalformedResponse(
                    "revocation registry definition has no value.tailsHash".to_string(),
                )
            })?;

        let tails_local_path = self
            .tails
            .relocate(record_id, &created.revoc_reg_id, &tails_hash)
            .await?;

        if let Some(value) = revoc_reg_def
            .get_mut("value")
            .and_then(Value::as_object_mut)
        {
            value.insert(
                "tailsLocation".to_string(),
                Value::String(tails_local_path.display().to_string()),
            );
        }

        Ok(GeneratedRegistry {
            revoc_reg_id: created.revoc_reg_id,
            revoc_reg_def,
            revoc_reg_entry,
            tails_hash,
            tails_local_path,
        })
    }

    /// Record where the tails file is publicly hosted.
    #[tracing::instrument(name = "revreg.set_tails_public_uri", skip_all, fields(%record_id))]
    pub async fn set_tails_file_public_uri(
        &self,
        record_id: Uuid,
        tails_public_uri: &str,
    ) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        record.set_tails_public_uri(tails_public_uri)?;
        self.persist(&record).await?;

        info!(
            %record_id,
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            tails_public_uri,
            "Set tails file public URI"
        );
        Ok(record)
    }

    /// Write the registry definition to the ledger.
    #[tracing::instrument(name = "revreg.publish_definition", skip_all, fields(%record_id))]
    pub async fn publish_definition(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _cred_def = self.lock_cred_def_of(record_id).await?;
        self.publish_definition_locked(record_id).await
    }

    async fn publish_definition_locked(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        record.ensure(Transition::PublishDefinition)?;

        let transition = Transition::PublishDefinition;
        let issuer_did = required(record.issuer_did(), &record, transition, "issuer DID")?;
        let revoc_reg_def = required(
            record.revoc_reg_def(),
            &record,
            transition,
            "revocation registry definition",
        )?;

        self.ledger
            .send_revoc_reg_def(revoc_reg_def, issuer_did)
            .await?;

        record.advance(transition)?;
        self.persist(&record).await?;

        info!(
            %record_id,
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            state = %record.state(),
            "Published revocation registry definition"
        );
        Ok(record)
    }

    /// Write the initial registry entry to the ledger, activating the registry.
    ///
    /// Fails if another registry for the same credential definition is active.
    #[tracing::instrument(name = "revreg.publish_entry", skip_all, fields(%record_id))]
    pub async fn publish_entry(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _cred_def = self.lock_cred_def_of(record_id).await?;
        self.publish_entry_locked(record_id).await
    }

    async fn publish_entry_locked(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        record.ensure(Transition::PublishEntry)?;

        if let Some(cred_def_id) = record.cred_def_id() {
            if let Some(active) = self.queries.find_active(cred_def_id).await? {
                if active.record_id() != record_id {
                    return Err(RevocationError::state(
                        Transition::PublishEntry.name(),
                        record.state(),
                        format!(
                            "registry {} is already active for credential definition {cred_def_id}",
                            active.revoc_reg_id().unwrap_or_default()
                        ),
                    ));
                }
            }
        }

        let transition = Transition::PublishEntry;
        let issuer_did = required(record.issuer_did(), &record, transition, "issuer DID")?;
        let revoc_reg_id = required(
            record.revoc_reg_id(),
            &record,
            transition,
            "revocation registry id",
        )?;
        let revoc_reg_entry = required(
            record.revoc_reg_entry(),
            &record,
            transition,
            "revocation registry entry",
        )?;

        self.ledger
            .send_revoc_reg_entry(
                revoc_reg_id,
                record.revoc_def_type(),
                revoc_reg_entry,
                issuer_did,
            )
            .await?;

        record.advance(transition)?;
        self.persist(&record).await?;

        info!(
            %record_id,
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            state = %record.state(),
            "Published revocation registry entry"
        );
        Ok(record)
    }

    /// Retire an active registry. No revocations can be staged afterwards.
    #[tracing::instrument(name = "revreg.mark_full", skip_all, fields(%record_id))]
    pub async fn mark_full(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _cred_def = self.lock_cred_def_of(record_id).await?;
        self.mark_full_locked(record_id).await
    }

    async fn mark_full_locked(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        record.advance(Transition::MarkFull)?;
        self.persist(&record).await?;

        info!(
            %record_id,
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            state = %record.state(),
            "Revocation registry is full"
        );
        Ok(record)
    }

    // ------------------------------------------------------------------
    // Pending revocations
    // ------------------------------------------------------------------

    /// Add a credential revocation index to the record's pending set.
    pub async fn mark_pending(&self, record_id: Uuid, token: &str) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        let added = record.mark_pending(token)?;
        self.persist(&record).await?;

        debug!(
            %record_id,
            token,
            added,
            pending = record.pending_pub().len(),
            "Marked revocation pending"
        );
        Ok(record)
    }

    /// Remove the given tokens from the pending set, or all of them when empty.
    pub async fn clear_pending(
        &self,
        record_id: Uuid,
        tokens: &[String],
    ) -> Result<IssuerRevRegRecord> {
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;
        let removed = record.clear_pending(tokens);
        self.persist(&record).await?;

        debug!(
            %record_id,
            removed,
            pending = record.pending_pub().len(),
            "Cleared pending revocations"
        );
        Ok(record)
    }

    /// Revoke and publish every pending token of an active or full registry.
    ///
    /// Only the tokens included in the published delta are cleared.
    #[tracing::instrument(name = "revreg.publish_pending", skip_all, fields(%record_id))]
    pub async fn publish_pending(&self, record_id: Uuid) -> Result<PendingPublication> {
        const OPERATION: &str = "publish pending revocations for";

        let _cred_def = self.lock_cred_def_of(record_id).await?;
        let _record = self.lock_record(record_id).await;
        let mut record = self.load(record_id).await?;

        if !matches!(record.state(), RecordState::Active | RecordState::Full) {
            return Err(RevocationError::state(
                OPERATION,
                record.state(),
                "registry entry is not yet published",
            ));
        }

        let revoc_reg_id = record
            .revoc_reg_id()
            .map(str::to_string)
            .ok_or_else(|| {
                RevocationError::state(OPERATION, record.state(), "missing revocation registry id")
            })?;

        if !record.has_pending() {
            return Ok(PendingPublication {
                record_id,
                revoc_reg_id,
                published: Vec::new(),
            });
        }

        let tokens = record.pending_pub().to_vec();
        let issuer_did = record.issuer_did().ok_or_else(|| {
            RevocationError::state(OPERATION, record.state(), "missing issuer DID")
        })?;
        let tails_local_path = record.tails_local_path().ok_or_else(|| {
            RevocationError::state(OPERATION, record.state(), "missing tails file path")
        })?;

        let delta_json = self
            .issuer
            .revoke_credentials(&revoc_reg_id, tails_local_path, &tokens)
            .await?;
        let delta: Value = serde_json::from_str(&delta_json).map_err(|e| {
            IssuerError::MalformedResponse(format!("revocation registry delta: {e}"))
        })?;

        self.ledger
            .send_revoc_reg_entry(&revoc_reg_id, record.revoc_def_type(), &delta, issuer_did)
            .await?;

        record.clear_pending(&tokens);
        self.persist(&record).await?;

        info!(
            %record_id,
            %revoc_reg_id,
            published = tokens.len(),
            "Published pending revocations"
        );
        Ok(PendingPublication {
            record_id,
            revoc_reg_id,
            published: tokens,
        })
    }

    /// Publish pending revocations of every record that has some.
    ///
    /// Records are processed earliest first. A failure is recorded in the
    /// report and does not stop the pass.
    #[tracing::instrument(name = "revreg.recover_pending", skip_all)]
    pub async fn recover_pending(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for record in self.queries.find_pending().await? {
            let record_id = record.record_id();
            if !matches!(record.state(), RecordState::Active | RecordState::Full) {
                debug!(
                    %record_id,
                    state = %record.state(),
                    "Pending revocations wait for activation"
                );
                report.skipped.push(record_id);
                continue;
            }
            match self.publish_pending(record_id).await {
                Ok(publication) => report.published.push(publication),
                Err(e) => {
                    warn!(%record_id, error = %e, "Failed to publish pending revocations");
                    report.failed.push((record_id, e));
                }
            }
        }

        info!(
            published = report.published.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Pending revocation recovery finished"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Capacity and rotation
    // ------------------------------------------------------------------

    /// Check an active registry against its capacity, retiring it when exhausted.
    #[tracing::instrument(name = "revreg.evaluate_capacity", skip_all, fields(%record_id))]
    pub async fn evaluate_capacity(&self, record_id: Uuid) -> Result<CapacityStatus> {
        let _cred_def = self.lock_cred_def_of(record_id).await?;
        let record = self.load(record_id).await?;

        match record.state() {
            RecordState::Active => {}
            RecordState::Full => return Ok(CapacityStatus::Full),
            state => {
                return Err(RevocationError::state(
                    "evaluate capacity of",
                    state,
                    "registry is not active",
                ))
            }
        }

        let revoc_reg_id = record.revoc_reg_id().unwrap_or_default();
        let occupied = self.allocation.occupied_count(revoc_reg_id).await?;
        let max_cred_num = record.max_cred_num();

        if !self.capacity.is_exhausted(occupied, max_cred_num) {
            debug!(%record_id, occupied, max_cred_num, "Revocation registry has capacity");
            return Ok(CapacityStatus::Available {
                occupied,
                max_cred_num,
            });
        }

        self.mark_full_locked(record_id).await?;
        Ok(CapacityStatus::Full)
    }

    /// Make sure a generated replacement exists for the active registry.
    ///
    /// Returns the earliest generated or posted standby if there is one;
    /// otherwise generates one (reusing an earlier `Init` attempt) with the
    /// active registry's issuer, capacity and scheme. When a tails server
    /// base URL is configured the standby's public URI is assigned.
    #[tracing::instrument(name = "revreg.stage_standby", skip_all, fields(%cred_def_id))]
    pub async fn stage_standby_registry(&self, cred_def_id: &str) -> Result<IssuerRevRegRecord> {
        let _cred_def = self.cred_def_locks.lock(cred_def_id).await;

        if let Some(standby) = self.queries.find_standby(cred_def_id).await? {
            debug!(record_id = %standby.record_id(), "Standby registry already staged");
            return self.assign_public_uri(standby).await;
        }

        let pending_init = self
            .queries
            .find_by_cred_def(cred_def_id, Some(RecordState::Init))
            .await?
            .into_iter()
            .next();

        let record_id = match pending_init {
            Some(record) => record.record_id(),
            None => {
                let active = self.queries.find_active(cred_def_id).await?.ok_or_else(|| {
                    RevocationError::NoRegistry {
                        cred_def_id: cred_def_id.to_string(),
                        wanted: "active",
                    }
                })?;
                let issuer_did = active.issuer_did().unwrap_or_default();
                let options = RegistryOptions {
                    revoc_def_type: active.revoc_def_type().to_string(),
                    max_cred_num: active.max_cred_num(),
                    issuance_type: active.issuance_type(),
                    tag: None,
                };
                self.create_record_with(issuer_did, cred_def_id, options)
                    .await?
                    .record_id()
            }
        };

        let record = self.generate_locked(record_id).await?;
        self.assign_public_uri(record).await
    }

    /// Point a standby at the configured tails server unless it already has a URI.
    async fn assign_public_uri(&self, record: IssuerRevRegRecord) -> Result<IssuerRevRegRecord> {
        if record.tails_public_uri().is_some() {
            return Ok(record);
        }
        match record
            .revoc_reg_id()
            .and_then(|id| self.tails_config.public_uri(id))
        {
            Some(uri) => self.set_tails_file_public_uri(record.record_id(), &uri).await,
            None => Ok(record),
        }
    }

    /// Retire the active registry and activate the earliest standby.
    ///
    /// The standby's definition is published before the active registry is
    /// retired, so only the entry write separates retirement from activation.
    /// Pending tokens stay on the retired record.
    #[tracing::instrument(name = "revreg.rotate", skip_all, fields(%cred_def_id))]
    pub async fn rotate(&self, cred_def_id: &str) -> Result<IssuerRevRegRecord> {
        let _cred_def = self.cred_def_locks.lock(cred_def_id).await;

        let active = self.queries.find_active(cred_def_id).await?;
        let Some(standby) = self.queries.find_standby(cred_def_id).await? else {
            return Err(match active {
                Some(active) => RevocationError::state(
                    "rotate",
                    active.state(),
                    "no standby registry is staged",
                ),
                None => RevocationError::NoRegistry {
                    cred_def_id: cred_def_id.to_string(),
                    wanted: "standby",
                },
            });
        };

        if standby.state() == RecordState::Generated {
            self.publish_definition_locked(standby.record_id()).await?;
        }
        if let Some(active) = active {
            self.mark_full_locked(active.record_id()).await?;
        }
        let record = self.publish_entry_locked(standby.record_id()).await?;

        info!(
            record_id = %record.record_id(),
            revoc_reg_id = record.revoc_reg_id().unwrap_or_default(),
            "Rotated to standby revocation registry"
        );
        Ok(record)
    }
}

/// A field every record past `Generated` carries.
fn required<'a, T: ?Sized>(
    field: Option<&'a T>,
    record: &IssuerRevRegRecord,
    transition: Transition,
    name: &str,
) -> Result<&'a T> {
    field.ok_or_else(|| {
        RevocationError::state(transition.name(), record.state(), format!("missing {name}"))
    })
}

//! In-memory RecordStore implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::record::{IssuerRevRegRecord, RecordState, SequenceId};
use crate::storage::{RecordStore, Result, StorageError};

/// Record store that keeps records in memory.
///
/// Nothing survives a restart. Used for tests and single-shot tooling.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<Uuid, IssuerRevRegRecord>>,
    last_sequence: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stored_count(&self) -> usize {
        self.records.read().await.len()
    }

    async fn select<F>(&self, predicate: F) -> Vec<IssuerRevRegRecord>
    where
        F: Fn(&IssuerRevRegRecord) -> bool + Send,
    {
        let records = self.records.read().await;
        let mut selected: Vec<_> = records.values().filter(|r| predicate(*r)).cloned().collect();
        selected.sort_by_key(IssuerRevRegRecord::sequence_id);
        selected
    }
}

fn check_revoc_reg_id_free(
    records: &HashMap<Uuid, IssuerRevRegRecord>,
    record: &IssuerRevRegRecord,
) -> Result<()> {
    let Some(revoc_reg_id) = record.revoc_reg_id() else {
        return Ok(());
    };
    let taken = records.values().any(|other| {
        other.record_id() != record.record_id() && other.revoc_reg_id() == Some(revoc_reg_id)
    });
    if taken {
        return Err(StorageError::DuplicateRevocRegId(revoc_reg_id.to_string()));
    }
    Ok(())
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, mut record: IssuerRevRegRecord) -> Result<IssuerRevRegRecord> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.record_id()) {
            return Err(StorageError::AlreadyExists(record.record_id()));
        }
        check_revoc_reg_id_free(&records, &record)?;

        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        record.assign_sequence_id(SequenceId::new(sequence))?;
        records.insert(record.record_id(), record.clone());
        Ok(record)
    }

    async fn update(&self, record: &IssuerRevRegRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let stored = records
            .get(&record.record_id())
            .ok_or_else(|| StorageError::NotFound(record.record_id().to_string()))?;
        if stored.sequence_id() != record.sequence_id() {
            return Err(StorageError::SequenceReassigned {
                record_id: record.record_id(),
                current: stored.sequence_id().value(),
                requested: record.sequence_id().value(),
            });
        }
        check_revoc_reg_id_free(&records, record)?;
        records.insert(record.record_id(), record.clone());
        Ok(())
    }

    async fn get(&self, record_id: Uuid) -> Result<IssuerRevRegRecord> {
        self.records
            .read()
            .await
            .get(&record_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(record_id.to_string()))
    }

    async fn find_by_revoc_reg_id(
        &self,
        revoc_reg_id: &str,
    ) -> Result<Option<IssuerRevRegRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.revoc_reg_id() == Some(revoc_reg_id))
            .cloned())
    }

    async fn find_by_cred_def(
        &self,
        cred_def_id: &str,
        state: Option<RecordState>,
    ) -> Result<Vec<IssuerRevRegRecord>> {
        Ok(self
            .select(|r| {
                r.cred_def_id() == Some(cred_def_id) && state.is_none_or(|s| r.state() == s)
            })
            .await)
    }

    async fn find_pending(&self) -> Result<Vec<IssuerRevRegRecord>> {
        Ok(self.select(IssuerRevRegRecord::has_pending).await)
    }
}
